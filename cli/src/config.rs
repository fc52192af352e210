use std::path::PathBuf;
use std::time::Duration;

use remix_config::{CONFIG_BACKEND, ConfigBackend, ConfigError, PATHS};
use remix_core::services::{CacheSettings, MIN_ARTIFACT_BYTES};
use remix_fs::DEFAULT_CHUNK_BYTES;
use serde::{Deserialize, Serialize};

/// Sección `[cache]` de `remix.toml`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  /// Donde se copian los archivos subidos.
  pub upload_dir: PathBuf,
  /// Raíz de salida del motor; los artefactos viven en `<output_dir>/<modelo>`.
  pub output_dir: PathBuf,
  pub min_artifact_bytes: u64,
  pub engine_timeout_secs: u64,
  pub build_wait_timeout_secs: u64,
  /// Antigüedad mínima de un huérfano para borrarlo (0 = sin margen).
  pub orphan_grace_secs: u64,
  pub artifact_exts: Vec<String>,
  pub hash_chunk_bytes: usize,
  pub max_depth: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      upload_dir: PATHS.upload_dir(),
      output_dir: PATHS.output_dir(),
      min_artifact_bytes: MIN_ARTIFACT_BYTES,
      engine_timeout_secs: 30 * 60,
      build_wait_timeout_secs: 60 * 60,
      orphan_grace_secs: 0,
      artifact_exts: vec!["wav".into()],
      hash_chunk_bytes: DEFAULT_CHUNK_BYTES,
      max_depth: 8,
    }
  }
}

impl CacheConfig {
  pub fn load() -> Result<Self, ConfigError> {
    let cfg = CONFIG_BACKEND.load_section_with_default("cache")?;
    CONFIG_BACKEND.save_section("cache", &cfg)?;
    Ok(cfg)
  }

  pub fn settings(&self) -> CacheSettings {
    CacheSettings {
      output_root: self.output_dir.clone(),
      min_artifact_bytes: self.min_artifact_bytes,
      engine_timeout: Duration::from_secs(self.engine_timeout_secs),
      build_wait_timeout: Duration::from_secs(self.build_wait_timeout_secs),
    }
  }

  pub fn orphan_grace(&self) -> Duration {
    Duration::from_secs(self.orphan_grace_secs)
  }
}
