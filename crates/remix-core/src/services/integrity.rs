use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tamaño mínimo (en bytes) para considerar real a un artefacto.
///
/// Archivos de este tamaño o menos son escrituras truncadas del motor, no audio.
pub const MIN_ARTIFACT_BYTES: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ProblemKind {
  Missing,
  Undersized { size_bytes: u64 },
}

/// Un artefacto que no pasó la validación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityProblem {
  pub name: String,
  pub path: PathBuf,
  #[serde(flatten)]
  pub kind: ProblemKind,
}

impl fmt::Display for IntegrityProblem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      ProblemKind::Missing => write!(f, "{} missing ({})", self.name, self.path.display()),
      ProblemKind::Undersized { size_bytes } => {
        write!(f, "{} undersized: {size_bytes} bytes ({})", self.name, self.path.display())
      }
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
  pub problems: Vec<IntegrityProblem>,
}

impl IntegrityReport {
  pub fn is_ok(&self) -> bool {
    self.problems.is_empty()
  }

  pub fn failed_names(&self) -> impl Iterator<Item = &str> {
    self.problems.iter().map(|p| p.name.as_str())
  }
}

/// Valida que un conjunto de artefactos con nombre sea utilizable.
///
/// Una entrada es válida si la ruta existe, es un archivo y pesa más que el umbral.
/// No modifica nada.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityValidator {
  min_bytes: u64,
}

impl Default for IntegrityValidator {
  fn default() -> Self {
    Self { min_bytes: MIN_ARTIFACT_BYTES }
  }
}

impl IntegrityValidator {
  pub fn new(min_bytes: u64) -> Self {
    Self { min_bytes }
  }

  /// Comprueba un único artefacto. `None` si es válido.
  pub async fn check(&self, path: &Path) -> Option<ProblemKind> {
    match tokio::fs::metadata(path).await {
      Ok(meta) if !meta.is_file() => Some(ProblemKind::Missing),
      Ok(meta) if meta.len() <= self.min_bytes => Some(ProblemKind::Undersized { size_bytes: meta.len() }),
      Ok(_) => None,
      Err(_) => Some(ProblemKind::Missing),
    }
  }

  /// Valida todas las entradas y devuelve la lista completa de fallos, en orden.
  pub async fn validate<'a, I, P>(&self, entries: I) -> IntegrityReport
  where
    I: IntoIterator<Item = (&'a str, P)>,
    P: AsRef<Path>,
  {
    let mut problems = Vec::new();
    for (name, path) in entries {
      let path = path.as_ref();
      if let Some(kind) = self.check(path).await {
        problems.push(IntegrityProblem { name: name.to_string(), path: path.to_path_buf(), kind });
      }
    }

    IntegrityReport { problems }
  }
}
