use std::future::Future;
use std::io;
use std::path::PathBuf;

use futures::stream::{self, Stream};
use tokio::fs::{self, ReadDir};

// =============================================================================
// 1. Configuración y Tipos
// =============================================================================

/// Configuración del recorrido.
///
/// Los symlinks nunca se siguen: todo lo que devuelve el walker cuelga
/// físicamente de la raíz, que es lo que necesita la limpieza de huérfanos.
#[derive(Debug, Clone)]
pub struct WalkConfig {
  pub max_depth: usize,
}

impl Default for WalkConfig {
  fn default() -> Self {
    Self { max_depth: 16 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtering {
  IgnoreDir, // No emitir y NO entrar si es dir.
  Continue,  // Emitir normalmente.
}

#[derive(Debug)]
pub struct WalkEntry {
  pub path: PathBuf,
  pub depth: usize,
  /// Tipo vía `lstat` (un symlink es symlink).
  pub file_type: std::fs::FileType,
}

impl WalkEntry {
  pub fn is_dir(&self) -> bool {
    self.file_type.is_dir()
  }

  pub fn is_file(&self) -> bool {
    self.file_type.is_file()
  }
}

// =============================================================================
// 2. Estado Interno
// =============================================================================

enum Frame {
  /// Directorio por abrir.
  Pending { path: PathBuf, depth: usize },
  /// Directorio abierto que estamos iterando.
  Open { rd: ReadDir, depth: usize },
}

// =============================================================================
// 3. Walker
// =============================================================================

/// Recorre `root` recursivamente, sin filtrar.
pub fn walk(root: impl Into<PathBuf>, cfg: WalkConfig) -> impl Stream<Item = io::Result<WalkEntry>> {
  walk_filtered(root, cfg, |_| async { Filtering::Continue })
}

/// Recorre `root` con un filtro asíncrono.
///
/// Los errores de E/S se emiten como elementos del stream y el recorrido sigue:
/// un directorio ilegible no corta el resto.
pub fn walk_filtered<F, Fut>(
  root: impl Into<PathBuf>,
  cfg: WalkConfig,
  filter: F,
) -> impl Stream<Item = io::Result<WalkEntry>>
where
  F: FnMut(&WalkEntry) -> Fut + Send + 'static,
  Fut: Future<Output = Filtering> + Send,
{
  let stack = vec![Frame::Pending { path: root.into(), depth: 0 }];

  stream::unfold((stack, cfg, filter), |(mut stack, cfg, mut filter)| async move {
    loop {
      // Pila vacía: fin del stream.
      let top = stack.last_mut()?;

      match top {
        Frame::Pending { path, depth } => {
          let path = std::mem::take(path);
          let depth = *depth;
          stack.pop();

          match fs::read_dir(&path).await {
            Ok(rd) => stack.push(Frame::Open { rd, depth }),
            Err(e) => return Some((Err(e), (stack, cfg, filter))),
          }
        }

        Frame::Open { rd, depth } => {
          let depth = *depth;

          match rd.next_entry().await {
            Ok(Some(entry)) => {
              let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(e) => return Some((Err(e), (stack, cfg, filter))),
              };

              let walk_entry = WalkEntry { path: entry.path(), depth: depth + 1, file_type };
              let filtering = filter(&walk_entry).await;

              if file_type.is_dir() && filtering != Filtering::IgnoreDir && walk_entry.depth <= cfg.max_depth {
                stack.push(Frame::Pending { path: walk_entry.path.clone(), depth: walk_entry.depth });
              }

              if filtering == Filtering::Continue {
                return Some((Ok(walk_entry), (stack, cfg, filter)));
              }
            }
            Ok(None) => {
              stack.pop();
            }
            Err(e) => {
              stack.pop();
              return Some((Err(e), (stack, cfg, filter)));
            }
          }
        }
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::StreamExt;
  use tempfile::tempdir;

  #[tokio::test]
  async fn respects_depth_and_ignore_dir() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("a/b/c")).unwrap();
    std::fs::create_dir_all(root.join(".hidden")).unwrap();
    std::fs::write(root.join("a/one.wav"), b"x").unwrap();
    std::fs::write(root.join("a/b/c/deep.wav"), b"x").unwrap();
    std::fs::write(root.join(".hidden/secret.wav"), b"x").unwrap();

    let entries = walk_filtered(root, WalkConfig { max_depth: 2 }, |e| {
      let hidden = e.path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'));
      async move { if hidden { Filtering::IgnoreDir } else { Filtering::Continue } }
    });

    let mut paths: Vec<PathBuf> = entries.filter_map(|r| async move { r.ok() }).map(|e| e.path).collect().await;
    paths.sort();

    assert_eq!(paths, vec![root.join("a"), root.join("a/b"), root.join("a/b/c"), root.join("a/one.wav")]);
  }

  #[tokio::test]
  async fn missing_root_yields_a_single_error() {
    let dir = tempdir().unwrap();
    let results: Vec<_> = walk(dir.path().join("nope"), WalkConfig::default()).collect().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
  }
}
