use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use remix_core::domain::ContentId;
use remix_core::services::{CacheOrchestrator, DiagnosticsReporter, OrphanReconciler, ProjectLedger};
use remix_fs::{ContentFingerprinter, FsArtifactStore};
use remix_ledger::{JsonLedgerStore, LedgerConfig, LedgerLock};
use remix_separator::{DemucsSeparator, SeparatorConfig};
use tracing::info;

use crate::config::CacheConfig;

type Orchestrator = CacheOrchestrator<ContentFingerprinter, DemucsSeparator, JsonLedgerStore>;

/// Adaptadores concretos cableados sobre un único ledger compartido.
///
/// El ledger queda bloqueado frente a otros procesos mientras viva la `App`.
pub struct App {
  pub cache: CacheConfig,
  pub separator: SeparatorConfig,
  pub orchestrator: Orchestrator,
  pub reconciler: OrphanReconciler<FsArtifactStore, JsonLedgerStore>,
  pub diagnostics: DiagnosticsReporter<FsArtifactStore, JsonLedgerStore>,
  _ledger_lock: LedgerLock,
}

impl App {
  pub async fn from_config() -> Result<Self> {
    let cache = CacheConfig::load().context("failed to load [cache] config")?;
    let separator = SeparatorConfig::load().context("failed to load [separator] config")?;
    let ledger = LedgerConfig::load().context("failed to load [ledger] config")?;
    Self::build(cache, separator, ledger).await
  }

  pub async fn build(cache: CacheConfig, separator: SeparatorConfig, ledger: LedgerConfig) -> Result<Self> {
    // 1. Ledger: exclusivo de este proceso, luego cargar o empezar vacío.
    let ledger_lock = LedgerLock::acquire(&ledger.ledger_path, cache.settings().build_wait_timeout).await?;
    let store = JsonLedgerStore::new(&ledger.ledger_path);
    let ledger = ProjectLedger::open(store)
      .with_context(|| format!("failed to open ledger {}", ledger.ledger_path.display()))?
      .into_shared();

    // 2. Artefactos: solo el directorio del modelo, nunca el resto de la salida.
    let engine = DemucsSeparator::new(separator.clone());
    let artifacts = FsArtifactStore::new(engine.model_dir(&cache.output_dir), cache.artifact_exts.clone())
      .with_max_depth(cache.max_depth);

    // 3. Servicios.
    let fingerprinter = ContentFingerprinter::new(cache.hash_chunk_bytes);
    let orchestrator = CacheOrchestrator::new(fingerprinter, engine, ledger.clone(), cache.settings());
    let reconciler = OrphanReconciler::new(artifacts.clone(), ledger.clone())
      .with_grace(cache.orphan_grace())
      .with_builds(orchestrator.builds());
    let diagnostics = DiagnosticsReporter::new(artifacts, ledger);

    Ok(Self { cache, separator, orchestrator, reconciler, diagnostics, _ledger_lock: ledger_lock })
  }

  /// Copia `path` al directorio de subidas y devuelve la ruta de la copia.
  ///
  /// Un archivo con el mismo nombre y distinto contenido nunca se pisa: la copia
  /// recibe el prefijo de su identidad.
  pub async fn stage_upload(&self, path: &Path) -> Result<PathBuf> {
    let id = self.orchestrator.identify(path).await?;

    if path.parent().is_some_and(|p| p == self.cache.upload_dir) {
      return Ok(path.to_path_buf());
    }

    let file_name = path.file_name().context("upload path has no file name")?;
    let mut target = self.cache.upload_dir.join(file_name);

    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
      if self.orchestrator.identify(&target).await.ok().as_ref() == Some(&id) {
        return Ok(target);
      }
      target = self.cache.upload_dir.join(disambiguated_name(path, &id));
      if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return Ok(target);
      }
    }

    tokio::fs::create_dir_all(&self.cache.upload_dir)
      .await
      .with_context(|| format!("failed to create {}", self.cache.upload_dir.display()))?;
    tokio::fs::copy(path, &target)
      .await
      .with_context(|| format!("failed to copy {} to {}", path.display(), target.display()))?;

    info!(from = %path.display(), to = %target.display(), "upload staged");
    Ok(target)
  }
}

/// `nombre_<id corto>.ext`
fn disambiguated_name(path: &Path, id: &ContentId) -> String {
  let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  match path.extension() {
    Some(ext) => format!("{stem}_{}.{}", id.short(), ext.to_string_lossy()),
    None => format!("{stem}_{}", id.short()),
  }
}
