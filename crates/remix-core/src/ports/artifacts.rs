use std::path::{Path, PathBuf};

/// Artefacto encontrado en disco bajo la raíz de salida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
  pub path: PathBuf,
  pub size_bytes: u64,
  pub modified_unix: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
  #[error("io error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("refusing to touch {} outside of {}", path.display(), root.display())]
  OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Port sobre los artefactos generados en disco.
///
/// Lo usan la reconciliación de huérfanos y los diagnósticos; nunca el camino
/// de lectura de caché.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Raíz bajo la que viven los artefactos.
  fn root(&self) -> &Path;

  /// Todos los artefactos descubribles bajo la raíz.
  async fn list_artifacts(&self) -> Result<Vec<ArtifactFile>, ArtifactError>;

  /// Bytes totales de artefactos en disco.
  async fn disk_usage(&self) -> Result<u64, ArtifactError> {
    Ok(self.list_artifacts().await?.iter().map(|a| a.size_bytes).sum())
  }

  /// Borra un artefacto. Borrar uno que ya no existe cuenta como éxito.
  async fn remove(&self, path: &Path) -> Result<(), ArtifactError>;

  /// Elimina directorios de artefactos que quedaron vacíos. Nunca borra la raíz.
  async fn prune_empty_dirs(&self) -> Result<Vec<PathBuf>, ArtifactError>;
}
