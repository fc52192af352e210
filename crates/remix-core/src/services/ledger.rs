use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{ContentId, Song};
use crate::errors::CacheError;
use crate::ports::LedgerStore;

/// Ledger compartido entre orquestador, reconciliador y diagnósticos.
pub type SharedLedger<S> = Arc<Mutex<ProjectLedger<S>>>;

/// Ledger del proyecto: la colección ordenada de canciones y su almacenamiento durable.
///
/// Ciclo de vida explícito: `open` (cargar o empezar vacío) → mutar → `save`.
/// Cada `save` reescribe el ledger entero.
pub struct ProjectLedger<S: LedgerStore> {
  store: S,
  songs: Vec<Song>,
}

impl<S: LedgerStore> ProjectLedger<S> {
  /// Ledger vacío, sin tocar el almacenamiento.
  pub fn empty(store: S) -> Self {
    Self { store, songs: Vec::new() }
  }

  /// Carga el estado previo o empieza vacío si no existe.
  ///
  /// Los registros corruptos se saltan (los descarta el store); aquí además se
  /// descartan identidades repetidas y pistas con nombre duplicado. Si hubo que
  /// limpiar algo, el ledger se reescribe ya depurado.
  pub fn open(store: S) -> Result<Self, CacheError> {
    let Some(loaded) = store.load()? else {
      info!("no prior ledger state, starting empty");
      return Ok(Self::empty(store));
    };

    for skipped in &loaded.skipped {
      warn!(index = skipped.index, reason = %skipped.reason, "skipped corrupt ledger record");
    }

    let mut ledger = Self::empty(store);
    let mut dirty = false;

    for mut song in loaded.songs {
      if ledger.find_by_identity(&song.id).is_some() {
        warn!(id = %song.id, title = %song.title, "duplicate identity in ledger, keeping first");
        dirty = true;
        continue;
      }

      let dropped = song.dedup_stems();
      if dropped > 0 {
        warn!(id = %song.id, dropped, "duplicate stem names in ledger, keeping first");
        dirty = true;
      }

      info!(id = %song.id.short(), title = %song.title, stems = song.stems.len(), "song restored");
      ledger.songs.push(song);
    }

    if dirty {
      ledger.save()?;
    }

    Ok(ledger)
  }

  pub fn into_shared(self) -> SharedLedger<S> {
    Arc::new(Mutex::new(self))
  }

  pub fn songs(&self) -> &[Song] {
    &self.songs
  }

  pub fn songs_mut(&mut self) -> &mut [Song] {
    &mut self.songs
  }

  pub fn len(&self) -> usize {
    self.songs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.songs.is_empty()
  }

  pub fn stem_count(&self) -> usize {
    self.songs.iter().map(|s| s.stems.len()).sum()
  }

  pub fn find_by_identity(&self, id: &ContentId) -> Option<&Song> {
    self.songs.iter().find(|s| &s.id == id)
  }

  pub fn find_by_identity_mut(&mut self, id: &ContentId) -> Option<&mut Song> {
    self.songs.iter_mut().find(|s| &s.id == id)
  }

  /// Búsqueda por nombre de archivo visible (acceso legado).
  ///
  /// Si más de una canción comparte ese nombre no hay forma de saber cuál es la
  /// buena, así que devuelve `None` en vez de arriesgar una canción equivocada.
  pub fn find_by_display_name(&self, name: &str) -> Option<&Song> {
    let mut matches = self.songs.iter().filter(|s| s.file_name() == Some(name));
    let first = matches.next()?;

    if matches.next().is_some() {
      warn!(name, "display name is ambiguous, refusing lookup");
      return None;
    }

    Some(first)
  }

  /// Inserta una canción nueva. La identidad, no el nombre, es la clave.
  pub fn add(&mut self, song: Song) -> Result<(), CacheError> {
    if self.find_by_identity(&song.id).is_some() {
      return Err(CacheError::DuplicateSong(song.id));
    }
    self.songs.push(song);
    Ok(())
  }

  pub fn remove(&mut self, id: &ContentId) -> Option<Song> {
    let pos = self.songs.iter().position(|s| &s.id == id)?;
    Some(self.songs.remove(pos))
  }

  /// Rutas de artefactos referenciadas por alguna pista.
  pub fn referenced_paths(&self) -> HashSet<PathBuf> {
    self.songs.iter().flat_map(|s| s.stems.iter().map(|st| st.path.clone())).collect()
  }

  /// Persiste el ledger completo.
  pub fn save(&self) -> Result<(), CacheError> {
    self.store.save(&self.songs)?;
    Ok(())
  }
}
