pub mod config;
pub mod lock;
pub mod models;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use remix_core::domain::Song;
use remix_core::ports::{LedgerError, LedgerStore, LoadedLedger, SkippedRecord};
use serde_json::Value;
use tracing::debug;

use crate::models::SongRecord;

pub use config::LedgerConfig;
pub use lock::{LedgerLock, LockError};

/// Ledger durable en un archivo JSON: un array ordenado de registros de canción.
///
/// Cada `save` reescribe el archivo entero de forma atómica.
#[derive(Debug, Clone)]
pub struct JsonLedgerStore {
  path: PathBuf,
}

impl JsonLedgerStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl LedgerStore for JsonLedgerStore {
  fn load(&self) -> Result<Option<LoadedLedger>, LedgerError> {
    let content = match std::fs::read_to_string(&self.path) {
      Ok(c) => c,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LedgerError::Io(format!("{}: {e}", self.path.display()))),
    };

    if content.trim().is_empty() {
      return Ok(None);
    }

    let root: Value = serde_json::from_str(&content)
      .map_err(|e| LedgerError::Corrupt(format!("{}: {e}", self.path.display())))?;

    let Value::Array(items) = root else {
      return Err(LedgerError::Corrupt(format!("{}: top level is not an array", self.path.display())));
    };

    let mut loaded = LoadedLedger::default();
    for (index, item) in items.into_iter().enumerate() {
      let song = serde_json::from_value::<SongRecord>(item)
        .map_err(|e| e.to_string())
        .and_then(|record| Song::try_from(record).map_err(|e| e.to_string()));

      match song {
        Ok(song) => loaded.songs.push(song),
        Err(reason) => loaded.skipped.push(SkippedRecord { index, reason }),
      }
    }

    debug!(path = %self.path.display(), songs = loaded.songs.len(), skipped = loaded.skipped.len(), "ledger loaded");
    Ok(Some(loaded))
  }

  fn save(&self, songs: &[Song]) -> Result<(), LedgerError> {
    let records: Vec<SongRecord> = songs.iter().map(SongRecord::from).collect();
    let json = serde_json::to_vec_pretty(&records).map_err(|e| LedgerError::Io(e.to_string()))?;

    remix_fs::atomic_write(&self.path, &json)
      .map_err(|e| LedgerError::Io(format!("{}: {e}", self.path.display())))?;

    debug!(path = %self.path.display(), songs = songs.len(), "ledger saved");
    Ok(())
  }
}
