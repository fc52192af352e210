use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
  #[error("failed to lock {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("ledger {} is in use by another process (waited {waited:?})", path.display())]
  Busy { path: PathBuf, waited: Duration },
}

/// Candado exclusivo entre procesos sobre un ledger (`flock` en `<ledger>.lock`).
///
/// Se libera al soltar el valor: cerrar el archivo suelta el `flock`.
#[derive(Debug)]
pub struct LedgerLock {
  path: PathBuf,
  _file: File,
}

impl LedgerLock {
  pub fn lock_path(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    ledger_path.with_file_name(name)
  }

  /// Espera como mucho `wait` a que ningún otro proceso tenga el ledger.
  pub async fn acquire(ledger_path: &Path, wait: Duration) -> Result<Self, LockError> {
    let path = Self::lock_path(ledger_path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      if let Err(source) = tokio::fs::create_dir_all(parent).await {
        return Err(LockError::Io { path, source });
      }
    }
    let file = match OpenOptions::new().create(true).truncate(false).write(true).open(&path) {
      Ok(file) => file,
      Err(source) => return Err(LockError::Io { path, source }),
    };

    let started = Instant::now();
    let mut announced = false;
    loop {
      match file.try_lock_exclusive() {
        Ok(()) => {
          debug!(path = %path.display(), "ledger lock acquired");
          return Ok(Self { path, _file: file });
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
          let waited = started.elapsed();
          if waited >= wait {
            return Err(LockError::Busy { path, waited });
          }
          if !announced {
            info!(path = %path.display(), "ledger in use by another process, waiting");
            announced = true;
          }
          tokio::time::sleep(POLL_INTERVAL.min(wait - waited)).await;
        }
        Err(source) => return Err(LockError::Io { path, source }),
      }
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}
