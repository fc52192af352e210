use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{ContentId, Song, SongSummary, Stem};
use crate::errors::CacheError;
use crate::ports::{Fingerprinter, LedgerStore, StemSeparator};
use crate::services::build_locks::BuildLocks;
use crate::services::integrity::{IntegrityProblem, IntegrityReport, IntegrityValidator, MIN_ARTIFACT_BYTES};
use crate::services::ledger::SharedLedger;

/// Parámetros del orquestador.
#[derive(Debug, Clone)]
pub struct CacheSettings {
  /// Directorio donde el motor deja sus salidas.
  pub output_root: PathBuf,
  pub min_artifact_bytes: u64,
  /// Tope para una invocación del motor; al vencer, la recomputación falla.
  pub engine_timeout: Duration,
  /// Tope para esperar a que termine la construcción en vuelo de otra petición.
  pub build_wait_timeout: Duration,
}

impl CacheSettings {
  pub fn new(output_root: impl Into<PathBuf>) -> Self {
    Self {
      output_root: output_root.into(),
      min_artifact_bytes: MIN_ARTIFACT_BYTES,
      engine_timeout: Duration::from_secs(30 * 60),
      build_wait_timeout: Duration::from_secs(60 * 60),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StemSource {
  /// Cache hit: pistas existentes y válidas, sin coste de recomputación.
  Cached,
  Recomputed,
}

/// Resultado de `ensure_stems`.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureOutcome {
  pub id: ContentId,
  pub source: StemSource,
  pub stems: Vec<Stem>,
  /// Problemas que invalidaron el conjunto previo (vacío en un hit).
  pub discarded: Vec<IntegrityProblem>,
  /// Artefactos recién producidos que se descartaron uno a uno.
  pub rejected: Vec<IntegrityProblem>,
}

impl EnsureOutcome {
  pub fn is_cache_hit(&self) -> bool {
    self.source == StemSource::Cached
  }

  pub fn stem_paths(&self) -> BTreeMap<String, PathBuf> {
    self.stems.iter().map(|s| (s.name.clone(), s.path.clone())).collect()
  }
}

/// Resultado de registrar una subida.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterOutcome {
  /// Contenido nuevo: se creó la canción.
  Registered { song: Song },
  /// Contenido ya conocido (quizá con otro nombre).
  Recognized { song: Song, integrity: IntegrityReport, source_path_updated: bool },
}

impl RegisterOutcome {
  pub fn song(&self) -> &Song {
    match self {
      RegisterOutcome::Registered { song } | RegisterOutcome::Recognized { song, .. } => song,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
  pub songs_updated: usize,
  pub stems_removed: usize,
}

enum Lookup {
  Hit(EnsureOutcome),
  Miss { source_path: PathBuf, discarded: Vec<IntegrityProblem> },
}

/// Motor de decisión hit/miss de la caché de pistas.
///
/// Resuelve canciones por identidad de contenido, nunca por nombre. Las
/// recomputaciones se serializan por identidad con `BuildLocks` y el motor
/// corre sin tener tomado el candado del ledger.
pub struct CacheOrchestrator<F, E, S>
where
  F: Fingerprinter,
  E: StemSeparator,
  S: LedgerStore,
{
  fingerprinter: F,
  engine: E,
  ledger: SharedLedger<S>,
  builds: BuildLocks,
  validator: IntegrityValidator,
  settings: CacheSettings,
}

impl<F, E, S> CacheOrchestrator<F, E, S>
where
  F: Fingerprinter,
  E: StemSeparator,
  S: LedgerStore,
{
  pub fn new(fingerprinter: F, engine: E, ledger: SharedLedger<S>, settings: CacheSettings) -> Self {
    let validator = IntegrityValidator::new(settings.min_artifact_bytes);
    Self { fingerprinter, engine, ledger, builds: BuildLocks::new(), validator, settings }
  }

  /// Candados de construcción; la limpieza de huérfanos los consulta.
  pub fn builds(&self) -> BuildLocks {
    self.builds.clone()
  }

  pub fn ledger(&self) -> SharedLedger<S> {
    Arc::clone(&self.ledger)
  }

  /// Identidad de contenido de un archivo.
  pub async fn identify(&self, path: &Path) -> Result<ContentId, CacheError> {
    self.fingerprinter.fingerprint(path).await.map_err(|e| match e.kind() {
      ErrorKind::NotFound => CacheError::SourceMissing(path.to_path_buf()),
      _ => CacheError::Fingerprint(format!("{}: {e}", path.display())),
    })
  }

  /// Registra un archivo subido, o lo reconoce si su contenido ya está en el ledger.
  pub async fn register_upload(&self, path: &Path, title: Option<&str>) -> Result<RegisterOutcome, CacheError> {
    let meta = match tokio::fs::metadata(path).await {
      Ok(m) if m.is_file() => m,
      Ok(_) => return Err(CacheError::SourceMissing(path.to_path_buf())),
      Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::SourceMissing(path.to_path_buf())),
      Err(e) => return Err(CacheError::Storage(format!("{}: {e}", path.display()))),
    };

    let id = self.identify(path).await?;
    debug!(id = %id.short(), path = %path.display(), "upload fingerprinted");

    let mut ledger = self.ledger.lock().await;

    if let Some(song) = ledger.find_by_identity_mut(&id) {
      let mut dirty = false;
      let mut source_path_updated = false;

      if !song.source_path.is_file() && song.source_path != path {
        warn!(id = %id.short(), old = %song.source_path.display(), new = %path.display(), "original upload gone, updating source path");
        song.source_path = path.to_path_buf();
        source_path_updated = true;
        dirty = true;
      }

      let dropped = song.dedup_stems();
      if dropped > 0 {
        warn!(id = %id.short(), dropped, "duplicate stems ignored");
        dirty = true;
      }

      let entries: Vec<(&str, &std::path::Path)> = song.stems.iter().map(|s| (s.name.as_str(), s.path.as_path())).collect();
      let integrity = self.validator.validate(entries).await;
      let song = song.clone();

      if dirty {
        ledger.save()?;
      }

      info!(id = %id.short(), title = %song.title, stems = song.stems.len(), valid = integrity.is_ok(), "upload recognized");
      return Ok(RegisterOutcome::Recognized { song, integrity, source_path_updated });
    }

    let title = title
      .map(str::to_string)
      .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
      .unwrap_or_else(|| id.to_string());

    let song = Song::new(id, title, path, meta.len());
    ledger.add(song.clone())?;
    ledger.save()?;

    info!(id = %song.id.short(), title = %song.title, "new song registered");
    Ok(RegisterOutcome::Registered { song })
  }

  /// Fingerprint del archivo y después `ensure_stems`.
  pub async fn ensure_stems_for_file(&self, path: &Path) -> Result<EnsureOutcome, CacheError> {
    let id = self.identify(path).await?;
    self.ensure_stems(&id).await
  }

  /// Garantiza pistas válidas para la canción `id`.
  ///
  /// Hit: devuelve las rutas existentes tal cual. Si alguna pista guardada falla
  /// la validación se descarta el conjunto entero y se recalcula. El motor se
  /// invoca una sola vez por petición y nunca se reintenta solo.
  pub async fn ensure_stems(&self, id: &ContentId) -> Result<EnsureOutcome, CacheError> {
    let _build = self.builds.acquire(id, self.settings.build_wait_timeout).await?;

    let (source_path, discarded) = match self.lookup(id).await? {
      Lookup::Hit(hit) => return Ok(hit),
      Lookup::Miss { source_path, discarded } => (source_path, discarded),
    };

    if !source_path.is_file() {
      return Err(CacheError::SourceMissing(source_path));
    }

    let produced = self.run_engine(id, &source_path).await?;
    let (stems, rejected) = self.screen_artifacts(id, produced).await;

    if stems.is_empty() {
      error!(id = %id.short(), rejected = rejected.len(), "separation produced no usable stems");
      return Err(CacheError::IntegrityFailure { id: id.clone(), problems: rejected });
    }

    let mut ledger = self.ledger.lock().await;
    let song = ledger.find_by_identity_mut(id).ok_or_else(|| CacheError::NotRegistered(id.clone()))?;
    song.replace_stems(stems);
    let stems = song.stems.clone();
    ledger.save()?;

    info!(id = %id.short(), stems = stems.len(), rejected = rejected.len(), "stems recomputed and committed");
    Ok(EnsureOutcome { id: id.clone(), source: StemSource::Recomputed, stems, discarded, rejected })
  }

  /// Consulta el ledger bajo su candado y decide hit o miss.
  async fn lookup(&self, id: &ContentId) -> Result<Lookup, CacheError> {
    let mut ledger = self.ledger.lock().await;
    let song = ledger.find_by_identity_mut(id).ok_or_else(|| CacheError::NotRegistered(id.clone()))?;

    let mut dirty = song.dedup_stems() > 0;
    let mut discarded = Vec::new();

    if song.has_stems() {
      let entries: Vec<(&str, &std::path::Path)> = song.stems.iter().map(|s| (s.name.as_str(), s.path.as_path())).collect();
      let report = self.validator.validate(entries).await;

      if report.is_ok() {
        let hit = EnsureOutcome {
          id: id.clone(),
          source: StemSource::Cached,
          stems: song.stems.clone(),
          discarded: Vec::new(),
          rejected: Vec::new(),
        };
        if dirty {
          ledger.save()?;
        }
        info!(id = %id.short(), stems = hit.stems.len(), "cache hit");
        return Ok(Lookup::Hit(hit));
      }

      warn!(id = %id.short(), problems = ?report.failed_names().collect::<Vec<_>>(), "integrity failure, discarding all stems");
      song.stems.clear();
      discarded = report.problems;
      dirty = true;
    }

    let source_path = song.source_path.clone();
    if dirty {
      ledger.save()?;
    }

    info!(id = %id.short(), "cache miss");
    Ok(Lookup::Miss { source_path, discarded })
  }

  async fn run_engine(
    &self,
    id: &ContentId,
    source_path: &Path,
  ) -> Result<Vec<(String, PathBuf)>, CacheError> {
    let started = Instant::now();
    info!(id = %id.short(), input = %source_path.display(), output = %self.settings.output_root.display(), "running separation engine");

    // El directorio de salida se deriva de la identidad, no del nombre del archivo.
    let run = self.engine.separate(source_path, &self.settings.output_root, id.as_str());
    match tokio::time::timeout(self.settings.engine_timeout, run).await {
      Ok(Ok(separated)) => {
        info!(
          id = %id.short(),
          output_dir = %separated.output_dir.display(),
          artifacts = separated.artifacts.len(),
          elapsed_ms = started.elapsed().as_millis() as u64,
          "separation engine finished"
        );
        Ok(separated.artifacts)
      }
      Ok(Err(source)) => {
        error!(id = %id.short(), error = %source, "separation engine failed");
        Err(CacheError::Engine { id: id.clone(), source })
      }
      Err(_) => {
        error!(id = %id.short(), after = ?self.settings.engine_timeout, "separation engine timed out");
        Err(CacheError::EngineTimeout { id: id.clone(), after: self.settings.engine_timeout })
      }
    }
  }

  /// Valida cada artefacto por separado: los pequeños o ausentes se descartan
  /// uno a uno, sin tumbar al resto.
  async fn screen_artifacts(&self, id: &ContentId, produced: Vec<(String, PathBuf)>) -> (Vec<Stem>, Vec<IntegrityProblem>) {
    let mut seen = HashSet::new();
    let mut stems = Vec::new();
    let mut rejected = Vec::new();

    for (name, path) in produced {
      if !seen.insert(name.clone()) {
        warn!(id = %id.short(), name = %name, "engine reported a stem twice, keeping first");
        continue;
      }

      match self.validator.check(&path).await {
        None => stems.push(Stem::new(name, path)),
        Some(kind) => {
          let problem = IntegrityProblem { name, path, kind };
          warn!(id = %id.short(), %problem, "dropping unusable artifact");
          rejected.push(problem);
        }
      }
    }

    (stems, rejected)
  }

  /// Revisa todas las canciones y quita individualmente las pistas inválidas.
  pub async fn rebuild_index(&self) -> Result<RebuildSummary, CacheError> {
    let mut ledger = self.ledger.lock().await;
    let mut summary = RebuildSummary::default();

    for song in ledger.songs_mut() {
      if !song.has_stems() {
        continue;
      }

      let id = song.id.short().to_string();
      let before = song.stems.len();
      let mut kept = Vec::with_capacity(before);
      for stem in std::mem::take(&mut song.stems) {
        match self.validator.check(&stem.path).await {
          None => kept.push(stem),
          Some(kind) => warn!(id = %id, name = %stem.name, ?kind, "removing invalid stem"),
        }
      }
      song.stems = kept;

      let removed = before - song.stems.len();
      if removed > 0 {
        warn!(title = %song.title, removed, "invalid stems removed");
        summary.songs_updated += 1;
        summary.stems_removed += removed;
      }
    }

    if summary.songs_updated > 0 {
      ledger.save()?;
      info!(songs = summary.songs_updated, stems = summary.stems_removed, "index rebuilt");
    }

    Ok(summary)
  }

  /// Borra una canción del ledger. Sus artefactos quedan huérfanos.
  pub async fn remove_song(&self, id: &ContentId) -> Result<Song, CacheError> {
    let mut ledger = self.ledger.lock().await;
    let song = ledger.remove(id).ok_or_else(|| CacheError::NotRegistered(id.clone()))?;
    ledger.save()?;

    info!(id = %id.short(), title = %song.title, stems = song.stems.len(), "song removed from ledger");
    Ok(song)
  }

  pub async fn list_songs(&self) -> Vec<SongSummary> {
    self.ledger.lock().await.songs().iter().map(Song::summary).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::ProjectLedger;
  use crate::testing::{Behavior, FakeSeparator, HashingFingerprinter, MemoryStore, four_stems};
  use tempfile::{TempDir, tempdir};

  type TestCache = CacheOrchestrator<HashingFingerprinter, FakeSeparator, MemoryStore>;

  struct Fixture {
    dir: TempDir,
    engine: FakeSeparator,
    store: MemoryStore,
    cache: Arc<TestCache>,
  }

  fn fixture(behavior: Behavior) -> Fixture {
    fixture_with(FakeSeparator::new(behavior), |_| {})
  }

  fn fixture_with(engine: FakeSeparator, tweak: impl FnOnce(&mut CacheSettings)) -> Fixture {
    let dir = tempdir().unwrap();
    let store = MemoryStore::default();
    let ledger = ProjectLedger::open(store.clone()).unwrap().into_shared();
    let mut settings = CacheSettings::new(dir.path().join("outputs"));
    tweak(&mut settings);
    let cache = Arc::new(CacheOrchestrator::new(HashingFingerprinter, engine.clone(), ledger, settings));
    Fixture { dir, engine, store, cache }
  }

  impl Fixture {
    fn upload(&self, name: &str, bytes: &[u8]) -> PathBuf {
      let uploads = self.dir.path().join("uploads");
      std::fs::create_dir_all(&uploads).unwrap();
      let path = uploads.join(name);
      std::fs::write(&path, bytes).unwrap();
      path
    }

    async fn register(&self, name: &str, bytes: &[u8]) -> ContentId {
      let path = self.upload(name, bytes);
      self.cache.register_upload(&path, None).await.unwrap().song().id.clone()
    }

    async fn ledger_stems(&self, id: &ContentId) -> Vec<Stem> {
      let ledger = self.cache.ledger();
      let guard = ledger.lock().await;
      guard.find_by_identity(id).unwrap().stems.clone()
    }
  }

  #[tokio::test]
  async fn unregistered_identity_is_reported() {
    let fx = fixture(four_stems(4096));
    let err = fx.cache.ensure_stems(&crate::testing::content_id(9)).await.unwrap_err();
    assert!(matches!(err, CacheError::NotRegistered(_)));
    assert_eq!(fx.engine.calls(), 0);
  }

  #[tokio::test]
  async fn second_ensure_is_a_pure_hit() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("a.mp3", b"song a").await;

    let first = fx.cache.ensure_stems(&id).await.unwrap();
    let second = fx.cache.ensure_stems(&id).await.unwrap();

    assert_eq!(first.source, StemSource::Recomputed);
    assert!(second.is_cache_hit());
    assert_eq!(first.stem_paths(), second.stem_paths());
    assert_eq!(second.stems.len(), 4);
    assert_eq!(fx.engine.calls(), 1);
  }

  #[tokio::test]
  async fn renamed_copy_hits_the_same_stems() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("A.mp3", b"identical bytes").await;
    let original = fx.cache.ensure_stems(&id).await.unwrap();
    {
      let ledger = fx.cache.ledger();
      let guard = ledger.lock().await;
      assert_eq!(guard.len(), 1);
      assert_eq!(guard.stem_count(), 4);
    }

    let copy = fx.upload("A_copy.mp3", b"identical bytes");
    let registered = fx.cache.register_upload(&copy, None).await.unwrap();
    assert!(matches!(registered, RegisterOutcome::Recognized { .. }));

    let again = fx.cache.ensure_stems_for_file(&copy).await.unwrap();
    assert!(again.is_cache_hit());
    assert_eq!(again.stem_paths(), original.stem_paths());
    assert_eq!(fx.engine.calls(), 1);
  }

  #[tokio::test]
  async fn same_name_different_content_is_not_a_hit() {
    let fx = fixture(four_stems(4096));
    let a = fx.register("song.mp3", b"first content").await;
    fx.cache.ensure_stems(&a).await.unwrap();

    let b = fx.register("song.mp3", b"second content").await;
    assert_ne!(a, b);
    let outcome = fx.cache.ensure_stems(&b).await.unwrap();
    assert_eq!(outcome.source, StemSource::Recomputed);
    assert_eq!(fx.engine.calls(), 2);
  }

  #[tokio::test]
  async fn shared_file_stem_never_shares_artifacts() {
    let fx = fixture(four_stems(4096));
    let a = fx.register("song.mp3", b"content A").await;
    let b = fx.register("song.wav", b"content B").await;

    let first_a = fx.cache.ensure_stems(&a).await.unwrap();
    let first_b = fx.cache.ensure_stems(&b).await.unwrap();
    assert_ne!(first_a.stem_paths(), first_b.stem_paths());
    assert!(first_a.stems.iter().all(|s| s.path.parent().unwrap().ends_with(a.as_str())));
    assert!(first_b.stems.iter().all(|s| s.path.parent().unwrap().ends_with(b.as_str())));

    let again_a = fx.cache.ensure_stems(&a).await.unwrap();
    assert!(again_a.is_cache_hit());
    assert_eq!(again_a.stem_paths(), first_a.stem_paths());
    assert_eq!(fx.engine.calls(), 2);
  }

  #[tokio::test]
  async fn one_missing_stem_discards_the_whole_set() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("a.mp3", b"content").await;
    let first = fx.cache.ensure_stems(&id).await.unwrap();
    std::fs::remove_file(&first.stem_paths()["drums"]).unwrap();

    // El motor ahora solo produce tres: si quedara alguna pista vieja se vería.
    fx.engine.set_behavior(Behavior::Produce(vec![("vocals", 4096), ("bass", 4096), ("other", 4096)]));
    let outcome = fx.cache.ensure_stems(&id).await.unwrap();

    assert_eq!(outcome.source, StemSource::Recomputed);
    assert_eq!(outcome.discarded.len(), 1);
    assert_eq!(outcome.discarded[0].name, "drums");
    assert_eq!(outcome.discarded[0].kind, crate::services::ProblemKind::Missing);
    assert_eq!(fx.ledger_stems(&id).await.len(), 3);
    assert_eq!(fx.engine.calls(), 2);
  }

  #[tokio::test]
  async fn truncated_stem_triggers_full_recompute() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("a.mp3", b"content").await;
    let first = fx.cache.ensure_stems(&id).await.unwrap();
    std::fs::write(&first.stem_paths()["bass"], vec![0u8; 500]).unwrap();

    let outcome = fx.cache.ensure_stems(&id).await.unwrap();

    assert_eq!(outcome.source, StemSource::Recomputed);
    assert_eq!(outcome.discarded[0].kind, crate::services::ProblemKind::Undersized { size_bytes: 500 });
    assert_eq!(outcome.stems.len(), 4);
    assert_eq!(fx.ledger_stems(&id).await.len(), 4);
    assert_eq!(fx.engine.calls(), 2);
  }

  #[tokio::test]
  async fn undersized_outputs_are_dropped_individually() {
    let fx = fixture(Behavior::Produce(vec![("vocals", 4096), ("drums", 10), ("bass", 4096), ("other", 4096)]));
    let id = fx.register("a.mp3", b"content").await;

    let outcome = fx.cache.ensure_stems(&id).await.unwrap();

    assert_eq!(outcome.stems.len(), 3);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].name, "drums");
    assert!(!outcome.stem_paths().contains_key("drums"));
  }

  #[tokio::test]
  async fn zero_usable_outputs_fail_without_retry() {
    let fx = fixture(four_stems(100));
    let id = fx.register("a.mp3", b"content").await;

    let err = fx.cache.ensure_stems(&id).await.unwrap_err();

    match err {
      CacheError::IntegrityFailure { problems, .. } => assert_eq!(problems.len(), 4),
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.engine.calls(), 1);
    assert!(fx.ledger_stems(&id).await.is_empty());
  }

  #[tokio::test]
  async fn engine_failure_is_surfaced() {
    let fx = fixture(Behavior::Fail);
    let id = fx.register("a.mp3", b"content").await;

    let err = fx.cache.ensure_stems(&id).await.unwrap_err();
    assert!(matches!(err, CacheError::Engine { .. }));
    assert_eq!(fx.engine.calls(), 1);
  }

  #[tokio::test]
  async fn engine_timeout_becomes_a_failure() {
    let fx = fixture_with(FakeSeparator::new(Behavior::Hang), |s| s.engine_timeout = Duration::from_millis(50));
    let id = fx.register("a.mp3", b"content").await;

    let err = fx.cache.ensure_stems(&id).await.unwrap_err();
    assert!(matches!(err, CacheError::EngineTimeout { .. }));

    // El candado de construcción se liberó: otra petición puede intentarlo.
    fx.engine.set_behavior(four_stems(4096));
    assert!(fx.cache.ensure_stems(&id).await.is_ok());
  }

  #[tokio::test]
  async fn missing_source_is_not_found() {
    let fx = fixture(four_stems(4096));
    let path = fx.upload("a.mp3", b"content");
    let id = fx.cache.register_upload(&path, None).await.unwrap().song().id.clone();
    std::fs::remove_file(&path).unwrap();

    let err = fx.cache.ensure_stems(&id).await.unwrap_err();
    assert!(matches!(err, CacheError::SourceMissing(_)));
    assert_eq!(fx.engine.calls(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_requests_share_one_build() {
    let engine = FakeSeparator::new(four_stems(4096)).with_delay(Duration::from_millis(100));
    let fx = fixture_with(engine, |_| {});
    let id = fx.register("a.mp3", b"content").await;

    let tasks: Vec<_> = (0..8)
      .map(|_| {
        let cache = Arc::clone(&fx.cache);
        let id = id.clone();
        tokio::spawn(async move { cache.ensure_stems(&id).await })
      })
      .collect();

    let mut paths = Vec::new();
    for t in tasks {
      paths.push(t.await.unwrap().unwrap().stem_paths());
    }

    assert_eq!(fx.engine.calls(), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn cleanup_during_a_build_keeps_its_outputs() {
    use crate::services::OrphanReconciler;
    use crate::testing::DirArtifacts;

    let engine = FakeSeparator::new(four_stems(4096)).with_delay(Duration::from_millis(150));
    let fx = fixture_with(engine, |_| {});
    let id = fx.register("a.mp3", b"content").await;
    let reconciler =
      OrphanReconciler::new(DirArtifacts::new(&fx.dir.path().join("outputs")), fx.cache.ledger()).with_builds(fx.cache.builds());

    let build = {
      let cache = Arc::clone(&fx.cache);
      let id = id.clone();
      tokio::spawn(async move { cache.ensure_stems(&id).await })
    };
    while fx.engine.calls() == 0 {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(matches!(reconciler.cleanup(true).await, Err(CacheError::BuildsInFlight(1))));

    let outcome = build.await.unwrap().unwrap();
    assert!(outcome.stem_paths().values().all(|p| p.is_file()));
    assert_eq!(reconciler.cleanup(true).await.unwrap().count(), 0);
    assert_eq!(fx.ledger_stems(&id).await.len(), 4);
  }

  #[tokio::test]
  async fn recognized_upload_replaces_a_vanished_source() {
    let fx = fixture(four_stems(4096));
    let original = fx.upload("take1.wav", b"same audio");
    fx.cache.register_upload(&original, Some("Take")).await.unwrap();
    std::fs::remove_file(&original).unwrap();

    let copy = fx.upload("take1_copy.wav", b"same audio");
    let outcome = fx.cache.register_upload(&copy, None).await.unwrap();

    match outcome {
      RegisterOutcome::Recognized { song, source_path_updated, .. } => {
        assert!(source_path_updated);
        assert_eq!(song.source_path, copy);
        assert_eq!(song.title, "Take");
      }
      other => panic!("expected recognition, got {other:?}"),
    }
    assert_eq!(fx.store.snapshot()[0].source_path, copy);
  }

  #[tokio::test]
  async fn rebuild_index_drops_only_bad_stems() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("a.mp3", b"content").await;
    let outcome = fx.cache.ensure_stems(&id).await.unwrap();
    std::fs::remove_file(&outcome.stem_paths()["other"]).unwrap();

    let summary = fx.cache.rebuild_index().await.unwrap();

    assert_eq!(summary, RebuildSummary { songs_updated: 1, stems_removed: 1 });
    assert_eq!(fx.ledger_stems(&id).await.len(), 3);
    assert_eq!(fx.store.snapshot()[0].stems.len(), 3);
  }

  #[tokio::test]
  async fn removed_song_is_no_longer_served() {
    let fx = fixture(four_stems(4096));
    let id = fx.register("a.mp3", b"content").await;
    fx.cache.ensure_stems(&id).await.unwrap();

    let removed = fx.cache.remove_song(&id).await.unwrap();
    assert_eq!(removed.stems.len(), 4);
    assert!(matches!(fx.cache.ensure_stems(&id).await, Err(CacheError::NotRegistered(_))));
    assert!(fx.cache.list_songs().await.is_empty());
  }
}
