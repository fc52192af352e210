use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use remix_core::domain::ContentId;
use remix_core::ports::Fingerprinter;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Tamaño de bloque por defecto al leer para el hash (1 MiB).
pub const DEFAULT_CHUNK_BYTES: usize = 1024 * 1024;

/// SHA-256 del contenido completo de `path`, leído en bloques de `chunk_bytes`.
pub fn fingerprint_file(path: &Path, chunk_bytes: usize) -> io::Result<ContentId> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = vec![0u8; chunk_bytes.max(1)];

  loop {
    let n = match file.read(&mut buffer) {
      Ok(0) => break,
      Ok(n) => n,
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(e),
    };
    hasher.update(&buffer[..n]);
  }

  Ok(ContentId::from_digest(hasher.finalize()))
}

/// Adapter de `Fingerprinter` con SHA-256.
///
/// El hash es CPU + E/S bloqueante, así que corre en `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct ContentFingerprinter {
  chunk_bytes: usize,
}

impl Default for ContentFingerprinter {
  fn default() -> Self {
    Self { chunk_bytes: DEFAULT_CHUNK_BYTES }
  }
}

impl ContentFingerprinter {
  pub fn new(chunk_bytes: usize) -> Self {
    Self { chunk_bytes }
  }
}

#[async_trait::async_trait]
impl Fingerprinter for ContentFingerprinter {
  async fn fingerprint(&self, path: &Path) -> io::Result<ContentId> {
    let owned: PathBuf = path.to_path_buf();
    let chunk_bytes = self.chunk_bytes;

    let id = tokio::task::spawn_blocking(move || fingerprint_file(&owned, chunk_bytes))
      .await
      .map_err(io::Error::other)??;

    debug!(path = %path.display(), id = %id.short(), "fingerprint computed");
    Ok(id)
  }
}
