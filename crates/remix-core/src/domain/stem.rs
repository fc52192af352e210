use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::song::Metadata;

/// Pista derivada (`Stem`): un artefacto con nombre producido por el motor de separación.
///
/// Ejemplos de nombre: "vocals", "drums", "bass", "other". El nombre es único
/// dentro de su canción.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stem {
  pub name: String,
  /// Ruta al archivo físico en disco.
  pub path: PathBuf,
  /// Duración en segundos, si se conoce.
  pub duration_secs: Option<f64>,
  pub metadata: Metadata,
}

impl Stem {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self { name: name.into(), path: path.into(), duration_secs: None, metadata: Metadata::new() }
  }
}
