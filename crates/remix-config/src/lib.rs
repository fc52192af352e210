mod backend;
mod paths;

pub use backend::{ConfigBackend, TomlConfigBackend};
pub use paths::{BASE_DIR_ENV, ConfigError, RemixPaths};

use once_cell::sync::Lazy;

// Paths del proyecto (REMIX_BASE_DIR o directorios del sistema)
pub static PATHS: Lazy<RemixPaths> = Lazy::new(|| RemixPaths::detect().expect("failed to init RemixPaths"));

// Backend de config sobre `remix.toml`
pub static CONFIG_BACKEND: Lazy<TomlConfigBackend> =
  Lazy::new(|| TomlConfigBackend::new(PATHS.config_file()));
