use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::CacheError;
use crate::ports::{ArtifactFile, ArtifactStore, LedgerStore};
use crate::services::build_locks::BuildLocks;
use crate::services::ledger::SharedLedger;

/// Resultado de una limpieza de huérfanos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
  pub deleted: Vec<PathBuf>,
  /// Borrados que fallaron, con el motivo. No abortan el lote.
  pub failed: Vec<(PathBuf, String)>,
  /// Huérfanos demasiado recientes para tocarlos.
  pub skipped_recent: Vec<PathBuf>,
  pub pruned_dirs: Vec<PathBuf>,
}

impl CleanupReport {
  pub fn count(&self) -> usize {
    self.deleted.len()
  }
}

/// Clave de comparación de rutas: canónica si el archivo existe, léxica si no.
pub(crate) fn artifact_key(path: &Path) -> PathBuf {
  std::fs::canonicalize(path)
    .unwrap_or_else(|_| path.components().filter(|c| !matches!(c, Component::CurDir)).collect())
}

/// Artefactos en disco que no referencia ninguna pista del ledger.
pub(crate) fn orphans_among<'a>(files: &'a [ArtifactFile], referenced: &HashSet<PathBuf>) -> Vec<&'a ArtifactFile> {
  let referenced: HashSet<PathBuf> = referenced.iter().map(|p| artifact_key(p)).collect();
  files.iter().filter(|f| !referenced.contains(&artifact_key(&f.path))).collect()
}

/// Encuentra y elimina artefactos huérfanos.
///
/// Huérfano = (artefactos en disco) − (rutas referenciadas por el ledger).
/// `cleanup` es destructivo y exige confirmación explícita; nada en el camino
/// de lectura de la caché lo invoca.
pub struct OrphanReconciler<A: ArtifactStore, S: LedgerStore> {
  artifacts: A,
  ledger: SharedLedger<S>,
  grace: Duration,
  builds: Option<BuildLocks>,
}

impl<A: ArtifactStore, S: LedgerStore> OrphanReconciler<A, S> {
  pub fn new(artifacts: A, ledger: SharedLedger<S>) -> Self {
    Self { artifacts, ledger, grace: Duration::ZERO, builds: None }
  }

  /// Con construcciones en curso, `cleanup` se niega en vez de borrar sus salidas.
  pub fn with_builds(mut self, builds: BuildLocks) -> Self {
    self.builds = Some(builds);
    self
  }

  /// Ignora huérfanos modificados hace menos de `grace` (construcciones en curso).
  pub fn with_grace(mut self, grace: Duration) -> Self {
    self.grace = grace;
    self
  }

  pub async fn find_orphans(&self) -> Result<BTreeSet<PathBuf>, CacheError> {
    let referenced = self.ledger.lock().await.referenced_paths();
    let files = self.artifacts.list_artifacts().await?;
    Ok(orphans_among(&files, &referenced).into_iter().map(|f| f.path.clone()).collect())
  }

  /// Borra los huérfanos y después los directorios que quedaron vacíos.
  ///
  /// El ledger queda bloqueado durante toda la limpieza para que ningún commit
  /// cambie el conjunto de referencias a mitad de camino. Una construcción lee
  /// el ledger antes de lanzar el motor, así que tras comprobar `in_flight`
  /// con el ledger tomado ninguna nueva puede escribir artefactos.
  pub async fn cleanup(&self, confirmed: bool) -> Result<CleanupReport, CacheError> {
    if !confirmed {
      return Err(CacheError::CleanupNotConfirmed);
    }

    let ledger = self.ledger.lock().await;
    if let Some(in_flight) = self.builds.as_ref().map(BuildLocks::in_flight).filter(|n| *n > 0) {
      warn!(in_flight, "builds in flight, orphan cleanup refused");
      return Err(CacheError::BuildsInFlight(in_flight));
    }

    let referenced = ledger.referenced_paths();
    let files = self.artifacts.list_artifacts().await?;
    let cutoff = SystemTime::now()
      .checked_sub(self.grace)
      .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
      .map_or(0, |d| d.as_secs());

    let mut report = CleanupReport::default();

    for orphan in orphans_among(&files, &referenced) {
      if !self.grace.is_zero() && orphan.modified_unix > cutoff {
        debug!(path = %orphan.path.display(), "orphan too recent, skipping");
        report.skipped_recent.push(orphan.path.clone());
        continue;
      }

      match self.artifacts.remove(&orphan.path).await {
        Ok(()) => {
          info!(path = %orphan.path.display(), bytes = orphan.size_bytes, "orphan deleted");
          report.deleted.push(orphan.path.clone());
        }
        Err(e) => {
          warn!(path = %orphan.path.display(), error = %e, "failed to delete orphan");
          report.failed.push((orphan.path.clone(), e.to_string()));
        }
      }
    }

    match self.artifacts.prune_empty_dirs().await {
      Ok(dirs) => {
        for dir in &dirs {
          info!(path = %dir.display(), "empty artifact directory removed");
        }
        report.pruned_dirs = dirs;
      }
      Err(e) => warn!(error = %e, "failed to prune empty directories"),
    }
    drop(ledger);

    info!(deleted = report.count(), failed = report.failed.len(), "orphan cleanup finished");
    Ok(report)
  }
}
