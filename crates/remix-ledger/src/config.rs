use remix_config::{CONFIG_BACKEND, ConfigBackend, ConfigError, PATHS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
  pub ledger_path: PathBuf,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    LedgerConfig { ledger_path: PATHS.ledger_file() }
  }
}

impl LedgerConfig {
  pub fn load() -> Result<Self, ConfigError> {
    let cfg = CONFIG_BACKEND.load_section_with_default("ledger")?;
    CONFIG_BACKEND.save_section("ledger", &cfg)?;
    Ok(cfg)
  }
}
