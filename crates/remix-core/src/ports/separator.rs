use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SeparationError {
  #[error("input not found: {}", .0.display())]
  InputMissing(PathBuf),

  #[error("failed to launch engine: {0}")]
  Spawn(String),

  #[error("engine exited with {code:?}: {stderr}")]
  ExitStatus { code: Option<i32>, stderr: String },

  #[error("engine did not create {}", .0.display())]
  MissingOutputDir(PathBuf),

  #[error("io error: {0}")]
  Io(String),
}

/// Lo que el motor dice haber producido.
///
/// `artifacts` mantiene el orden del motor. El tamaño de cada archivo todavía
/// no se ha validado: eso lo decide el orquestador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatedStems {
  pub output_dir: PathBuf,
  pub artifacts: Vec<(String, PathBuf)>,
}

/// Port del motor externo de separación (Demucs u otro).
///
/// Dado un archivo de entrada y un directorio de salida, deja un conjunto fijo
/// de pistas con nombre bajo una subruta derivada de `job`, nunca del nombre de
/// la entrada: dos contenidos con el mismo nombre no pueden compartir artefactos.
/// Cancelar el future debe terminar el proceso externo.
#[async_trait::async_trait]
pub trait StemSeparator: Send + Sync {
  async fn separate(&self, input: &Path, output_root: &Path, job: &str)
  -> Result<SeparatedStems, SeparationError>;
}
