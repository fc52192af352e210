// crates/remix-core/src/errors.rs
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::ContentId;
use crate::ports::{ArtifactError, LedgerError, SeparationError};
use crate::services::integrity::IntegrityProblem;

/// Error del núcleo de caché.
///
/// Los fallos de integridad y del motor durante una lectura de caché se
/// recuperan recalculando; los que llegan hasta aquí son terminales para
/// esa petición. La CLI los mapea a mensajes de usuario o logs.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("source file not found: {}", .0.display())]
  SourceMissing(PathBuf),

  #[error("song {0} is not registered in the ledger")]
  NotRegistered(ContentId),

  #[error("song {0} is already registered")]
  DuplicateSong(ContentId),

  #[error("no usable stems for {id}: {}", describe(.problems))]
  IntegrityFailure { id: ContentId, problems: Vec<IntegrityProblem> },

  #[error("separation engine failed for {id}: {source}")]
  Engine {
    id: ContentId,
    #[source]
    source: SeparationError,
  },

  #[error("separation engine timed out for {id} after {after:?}")]
  EngineTimeout { id: ContentId, after: Duration },

  #[error("timed out after {after:?} waiting for the in-flight build of {id}")]
  BuildWaitTimeout { id: ContentId, after: Duration },

  #[error("ledger corruption: {0}")]
  LedgerCorruption(String),

  #[error("storage error: {0}")]
  Storage(String),

  #[error("fingerprint error: {0}")]
  Fingerprint(String),

  #[error("orphan cleanup requires explicit confirmation")]
  CleanupNotConfirmed,

  #[error("orphan cleanup refused: {0} build(s) in flight")]
  BuildsInFlight(usize),
}

fn describe(problems: &[IntegrityProblem]) -> String {
  problems.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl From<LedgerError> for CacheError {
  fn from(err: LedgerError) -> Self {
    match err {
      LedgerError::Corrupt(msg) => CacheError::LedgerCorruption(msg),
      LedgerError::Io(msg) => CacheError::Storage(msg),
    }
  }
}

impl From<ArtifactError> for CacheError {
  fn from(err: ArtifactError) -> Self {
    CacheError::Storage(err.to_string())
  }
}
