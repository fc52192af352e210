use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use futures::StreamExt;
use remix_core::ports::{ArtifactError, ArtifactFile, ArtifactStore};
use tracing::warn;

use crate::async_walker::{Filtering, WalkConfig, WalkEntry, walk_filtered};

/// Artefactos generados por el motor, en disco bajo `root`.
///
/// Solo cuentan los archivos con extensión de artefacto; los directorios ocultos
/// y los `.tmp` a medio escribir se ignoran.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
  root: PathBuf,
  exts: Vec<String>,
  max_depth: usize,
}

impl FsArtifactStore {
  pub fn new(root: impl Into<PathBuf>, exts: Vec<String>) -> Self {
    Self { root: root.into(), exts, max_depth: 8 }
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Self {
    self.max_depth = max_depth;
    self
  }

  fn is_artifact(&self, path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) => self.exts.iter().any(|e| e.eq_ignore_ascii_case(ext)),
      None => false,
    }
  }

  /// Todas las entradas bajo la raíz (archivos y directorios).
  async fn entries(&self) -> Vec<WalkEntry> {
    if !self.root.is_dir() {
      return Vec::new();
    }

    let entries = walk_filtered(&self.root, WalkConfig { max_depth: self.max_depth }, |entry| {
      let hidden = entry.path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'));
      async move { if hidden { Filtering::IgnoreDir } else { Filtering::Continue } }
    });
    tokio::pin!(entries);

    let mut out = Vec::new();
    while let Some(res) = entries.next().await {
      match res {
        Ok(e) => out.push(e),
        // Un directorio ilegible no aborta el recorrido.
        Err(e) => warn!(root = %self.root.display(), error = %e, "walker error"),
      }
    }
    out
  }
}

#[async_trait::async_trait]
impl ArtifactStore for FsArtifactStore {
  fn root(&self) -> &Path {
    &self.root
  }

  async fn list_artifacts(&self) -> Result<Vec<ArtifactFile>, ArtifactError> {
    let mut files = Vec::new();

    for entry in self.entries().await {
      if !entry.is_file() || !self.is_artifact(&entry.path) {
        continue;
      }

      match tokio::fs::metadata(&entry.path).await {
        Ok(meta) => {
          let modified_unix = meta
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());
          files.push(ArtifactFile { path: entry.path, size_bytes: meta.len(), modified_unix });
        }
        // Borrado entre el listado y el stat.
        Err(e) if e.kind() == ErrorKind::NotFound => continue,
        Err(e) => warn!(path = %entry.path.display(), error = %e, "metadata error"),
      }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
  }

  async fn remove(&self, path: &Path) -> Result<(), ArtifactError> {
    if !path.starts_with(&self.root) {
      return Err(ArtifactError::OutsideRoot { path: path.to_path_buf(), root: self.root.clone() });
    }

    match tokio::fs::remove_file(path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(source) => Err(ArtifactError::Io { path: path.to_path_buf(), source }),
    }
  }

  async fn prune_empty_dirs(&self) -> Result<Vec<PathBuf>, ArtifactError> {
    let mut dirs: Vec<WalkEntry> = self.entries().await.into_iter().filter(WalkEntry::is_dir).collect();
    // Primero los más profundos, así un padre puede quedar vacío en la misma pasada.
    dirs.sort_by(|a, b| b.depth.cmp(&a.depth));

    let mut pruned = Vec::new();
    for dir in dirs {
      let empty = match tokio::fs::read_dir(&dir.path).await {
        Ok(mut rd) => matches!(rd.next_entry().await, Ok(None)),
        Err(_) => false,
      };
      if !empty {
        continue;
      }

      match tokio::fs::remove_dir(&dir.path).await {
        Ok(()) => pruned.push(dir.path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => return Err(ArtifactError::Io { path: dir.path, source }),
      }
    }

    Ok(pruned)
  }
}
