use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Variable de entorno que fija todos los directorios bajo una sola raíz.
pub const BASE_DIR_ENV: &str = "REMIX_BASE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("toml error: {0}")]
  Toml(#[from] toml::de::Error),
  #[error("directories error: could not determine home directory")]
  Directories,
  #[error("invalid section [{section}]: {message}")]
  Section { section: String, message: String },
  #[error("other: {0}")]
  Other(String),
}

#[derive(Debug, Clone)]
pub struct RemixPaths {
  pub base_dir: PathBuf,
  pub config_dir: PathBuf,
  pub data_dir: PathBuf,
  pub cache_dir: PathBuf,
}

impl RemixPaths {
  /// Todo bajo `base`: `config/`, `data/` y `cache/`.
  pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let base = base.as_ref();
    let paths = Self {
      base_dir: base.to_path_buf(),
      config_dir: base.join("config"),
      data_dir: base.join("data"),
      cache_dir: base.join("cache"),
    };
    paths.ensure_dirs()?;
    Ok(paths)
  }

  /// `REMIX_BASE_DIR` si está definida; si no, los directorios de la plataforma.
  pub fn detect() -> Result<Self, ConfigError> {
    if let Some(base) = std::env::var_os(BASE_DIR_ENV).filter(|v| !v.is_empty()) {
      return Self::at(PathBuf::from(base));
    }

    let proj_dirs = ProjectDirs::from("com", "remix", "remix").ok_or(ConfigError::Directories)?;
    let paths = Self {
      base_dir: proj_dirs.config_dir().to_path_buf(),
      config_dir: proj_dirs.config_dir().to_path_buf(),
      data_dir: proj_dirs.data_dir().to_path_buf(),
      cache_dir: proj_dirs.cache_dir().to_path_buf(),
    };
    paths.ensure_dirs()?;
    Ok(paths)
  }

  fn ensure_dirs(&self) -> Result<(), ConfigError> {
    std::fs::create_dir_all(&self.config_dir)?;
    std::fs::create_dir_all(&self.data_dir)?;
    std::fs::create_dir_all(&self.cache_dir)?;
    Ok(())
  }

  pub fn config_file(&self) -> PathBuf {
    self.config_dir.join("remix.toml")
  }

  /// Ledger por defecto del proyecto.
  pub fn ledger_file(&self) -> PathBuf {
    self.data_dir.join("project_state.json")
  }

  /// Subidas por defecto.
  pub fn upload_dir(&self) -> PathBuf {
    self.data_dir.join("uploads")
  }

  /// Salida del motor por defecto.
  pub fn output_dir(&self) -> PathBuf {
    self.data_dir.join("output")
  }
}
