use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::errors::CacheError;
use crate::ports::{ArtifactStore, LedgerStore};
use crate::services::ledger::SharedLedger;
use crate::services::reconciler::orphans_among;

/// Foto del estado de la caché. Solo para visibilidad operativa.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
  pub generated_at: DateTime<Utc>,
  pub artifact_root: PathBuf,
  pub total_artifact_bytes: u64,
  pub cache_size_mb: f64,
  pub songs: usize,
  pub stems_in_ledger: usize,
  pub artifacts_on_disk: usize,
  pub orphan_count: usize,
  pub orphaned_files: Vec<PathBuf>,
  /// Artefactos referenciados ÷ artefactos en disco, a 3 decimales (0 si no hay ninguno).
  pub utilization: f64,
}

/// Agrega métricas de tamaño, uso y huérfanos. Nunca modifica nada.
pub struct DiagnosticsReporter<A: ArtifactStore, S: LedgerStore> {
  artifacts: A,
  ledger: SharedLedger<S>,
}

impl<A: ArtifactStore, S: LedgerStore> DiagnosticsReporter<A, S> {
  pub fn new(artifacts: A, ledger: SharedLedger<S>) -> Self {
    Self { artifacts, ledger }
  }

  pub async fn report(&self) -> Result<CacheReport, CacheError> {
    let (songs, stems_in_ledger, referenced) = {
      let ledger = self.ledger.lock().await;
      (ledger.len(), ledger.stem_count(), ledger.referenced_paths())
    };

    let files = self.artifacts.list_artifacts().await?;
    let orphaned_files: Vec<PathBuf> = orphans_among(&files, &referenced).into_iter().map(|f| f.path.clone()).collect();
    let total_artifact_bytes: u64 = files.iter().map(|f| f.size_bytes).sum();

    let artifacts_on_disk = files.len();
    let utilization = if artifacts_on_disk == 0 {
      0.0
    } else {
      let ratio = (artifacts_on_disk - orphaned_files.len()) as f64 / artifacts_on_disk as f64;
      (ratio * 1000.0).round() / 1000.0
    };

    Ok(CacheReport {
      generated_at: Utc::now(),
      artifact_root: self.artifacts.root().to_path_buf(),
      total_artifact_bytes,
      cache_size_mb: (total_artifact_bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0,
      songs,
      stems_in_ledger,
      artifacts_on_disk,
      orphan_count: orphaned_files.len(),
      orphaned_files,
      utilization,
    })
  }
}
