//! Dobles de prueba compartidos por los tests del núcleo.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use crate::domain::{ContentId, Song};
use crate::ports::{
  ArtifactError, ArtifactFile, ArtifactStore, Fingerprinter, LedgerError, LedgerStore, LoadedLedger,
  SeparatedStems, SeparationError, StemSeparator,
};

pub fn content_id(seed: u8) -> ContentId {
  ContentId::from_digest([seed; 32])
}

/// Ledger en memoria que cuenta cuántas veces se guardó.
#[derive(Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<Option<LoadedLedger>>>,
  saves: Arc<AtomicUsize>,
}

impl MemoryStore {
  pub fn with_state(state: LoadedLedger) -> Self {
    Self { state: Arc::new(Mutex::new(Some(state))), saves: Arc::default() }
  }

  pub fn saves(&self) -> usize {
    self.saves.load(Ordering::SeqCst)
  }

  pub fn snapshot(&self) -> Vec<Song> {
    self.state.lock().unwrap().as_ref().map(|s| s.songs.clone()).unwrap_or_default()
  }
}

impl LedgerStore for MemoryStore {
  fn load(&self) -> Result<Option<LoadedLedger>, LedgerError> {
    Ok(self.state.lock().unwrap().clone())
  }

  fn save(&self, songs: &[Song]) -> Result<(), LedgerError> {
    self.saves.fetch_add(1, Ordering::SeqCst);
    *self.state.lock().unwrap() = Some(LoadedLedger { songs: songs.to_vec(), skipped: Vec::new() });
    Ok(())
  }
}

/// Huella de prueba: mismos bytes, misma identidad. No es criptográfica.
#[derive(Clone, Default)]
pub struct HashingFingerprinter;

#[async_trait::async_trait]
impl Fingerprinter for HashingFingerprinter {
  async fn fingerprint(&self, path: &Path) -> std::io::Result<ContentId> {
    let bytes = tokio::fs::read(path).await?;
    let mut digest = Vec::with_capacity(32);
    for round in 0u64..4 {
      let mut h = DefaultHasher::new();
      round.hash(&mut h);
      bytes.hash(&mut h);
      digest.extend_from_slice(&h.finish().to_be_bytes());
    }
    Ok(ContentId::from_digest(digest))
  }
}

#[derive(Clone)]
pub enum Behavior {
  /// Escribe cada pista con el tamaño indicado.
  Produce(Vec<(&'static str, usize)>),
  /// Sale con código distinto de cero.
  Fail,
  /// Nunca termina.
  Hang,
}

pub const FOUR_STEMS: [&str; 4] = ["vocals", "drums", "bass", "other"];

pub fn four_stems(size: usize) -> Behavior {
  Behavior::Produce(FOUR_STEMS.iter().map(|n| (*n, size)).collect())
}

/// Motor falso: cuenta invocaciones y deja archivos en `<out>/fake/<job>/<name>.wav`.
#[derive(Clone)]
pub struct FakeSeparator {
  calls: Arc<AtomicUsize>,
  behavior: Arc<Mutex<Behavior>>,
  delay: Duration,
}

impl FakeSeparator {
  pub fn new(behavior: Behavior) -> Self {
    Self { calls: Arc::default(), behavior: Arc::new(Mutex::new(behavior)), delay: Duration::ZERO }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn set_behavior(&self, behavior: Behavior) {
    *self.behavior.lock().unwrap() = behavior;
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait::async_trait]
impl StemSeparator for FakeSeparator {
  async fn separate(&self, _input: &Path, output_root: &Path, job: &str) -> Result<SeparatedStems, SeparationError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;

    let behavior = self.behavior.lock().unwrap().clone();
    let stems = match behavior {
      Behavior::Produce(stems) => stems,
      Behavior::Fail => return Err(SeparationError::ExitStatus { code: Some(1), stderr: "boom".into() }),
      Behavior::Hang => std::future::pending().await,
    };

    let output_dir = output_root.join("fake").join(job);
    std::fs::create_dir_all(&output_dir).map_err(|e| SeparationError::Io(e.to_string()))?;

    let mut artifacts = Vec::new();
    for (name, size) in stems {
      let path: PathBuf = output_dir.join(format!("{name}.wav"));
      std::fs::write(&path, vec![7u8; size]).map_err(|e| SeparationError::Io(e.to_string()))?;
      artifacts.push((name.to_string(), path));
    }

    Ok(SeparatedStems { output_dir, artifacts })
  }
}

/// Artefactos = todos los archivos bajo `root`, recorridos con `std::fs`.
#[derive(Clone)]
pub struct DirArtifacts {
  root: PathBuf,
}

impl DirArtifacts {
  pub fn new(root: &Path) -> Self {
    Self { root: root.to_path_buf() }
  }

  fn collect(dir: &Path, files: &mut Vec<ArtifactFile>, dirs: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
      let path = entry.path();
      if path.is_dir() {
        dirs.push(path.clone());
        Self::collect(&path, files, dirs);
      } else if let Ok(meta) = entry.metadata() {
        let modified_unix = meta
          .modified()
          .ok()
          .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
          .map_or(0, |d| d.as_secs());
        files.push(ArtifactFile { path, size_bytes: meta.len(), modified_unix });
      }
    }
  }
}

#[async_trait::async_trait]
impl ArtifactStore for DirArtifacts {
  fn root(&self) -> &Path {
    &self.root
  }

  async fn list_artifacts(&self) -> Result<Vec<ArtifactFile>, ArtifactError> {
    let (mut files, mut dirs) = (Vec::new(), Vec::new());
    Self::collect(&self.root, &mut files, &mut dirs);
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
  }

  async fn remove(&self, path: &Path) -> Result<(), ArtifactError> {
    match std::fs::remove_file(path) {
      Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
        Err(ArtifactError::Io { path: path.to_path_buf(), source: e })
      }
      _ => Ok(()),
    }
  }

  async fn prune_empty_dirs(&self) -> Result<Vec<PathBuf>, ArtifactError> {
    let (mut files, mut dirs) = (Vec::new(), Vec::new());
    Self::collect(&self.root, &mut files, &mut dirs);
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut pruned = Vec::new();
    for dir in dirs {
      if std::fs::remove_dir(&dir).is_ok() {
        pruned.push(dir);
      }
    }
    Ok(pruned)
  }
}
