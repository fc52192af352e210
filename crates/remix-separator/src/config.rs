use remix_config::{CONFIG_BACKEND, ConfigBackend, ConfigError};
use serde::{Deserialize, Serialize};

/// Sección `[separator]`: cómo se lanza el motor de separación.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SeparatorConfig {
  /// Ejecutable del motor.
  pub program: String,
  /// Argumentos antes de los propios del motor (p. ej. `["-m", "demucs"]` con `python`).
  pub leading_args: Vec<String>,
  pub model: String,
  /// Pistas que el modelo produce, en orden.
  pub stem_names: Vec<String>,
  pub stem_ext: String,
}

impl Default for SeparatorConfig {
  fn default() -> Self {
    Self {
      program: "demucs".into(),
      leading_args: Vec::new(),
      model: "htdemucs".into(),
      stem_names: ["vocals", "drums", "bass", "other"].map(String::from).to_vec(),
      stem_ext: "wav".into(),
    }
  }
}

impl SeparatorConfig {
  pub fn load() -> Result<Self, ConfigError> {
    let cfg = CONFIG_BACKEND.load_section_with_default("separator")?;
    CONFIG_BACKEND.save_section("separator", &cfg)?;
    Ok(cfg)
  }
}
