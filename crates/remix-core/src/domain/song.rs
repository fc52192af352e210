use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::identity::ContentId;
use crate::domain::stem::Stem;

/// Diccionario libre de etiquetas (artista, álbum, bpm, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// La Canción (Song): un contenido de audio distinto subido por el usuario.
///
/// Hay como mucho una `Song` por `ContentId` dentro de un ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
  /// Identidad de contenido; clave primaria de deduplicación.
  pub id: ContentId,
  /// Título visible (por defecto, el nombre del archivo subido).
  pub title: String,
  /// Ruta al archivo fuente. Puede cambiar si el original desaparece y se vuelve a subir.
  pub source_path: PathBuf,
  /// Formato inferido de la extensión (mp3, wav, ...).
  pub format: Option<String>,
  pub size_bytes: u64,
  pub uploaded_at: DateTime<Utc>,
  /// Pistas derivadas, en el orden en que se registraron.
  pub stems: Vec<Stem>,
  pub metadata: Metadata,
}

/// Resumen de una canción, pensado para listados.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongSummary {
  pub id: ContentId,
  pub title: String,
  pub file_name: String,
  pub format: Option<String>,
  pub size_kb: u64,
  pub uploaded_at: DateTime<Utc>,
  pub stem_count: usize,
}

impl Song {
  pub fn new(id: ContentId, title: impl Into<String>, source_path: impl Into<PathBuf>, size_bytes: u64) -> Self {
    let source_path = source_path.into();
    let format = infer_format(&source_path);

    Self {
      id,
      title: title.into(),
      source_path,
      format,
      size_bytes,
      uploaded_at: Utc::now(),
      stems: Vec::new(),
      metadata: Metadata::new(),
    }
  }

  /// Nombre base del archivo fuente; es lo que el usuario ve como "nombre de archivo".
  pub fn file_name(&self) -> Option<&str> {
    self.source_path.file_name().and_then(|n| n.to_str())
  }

  pub fn has_stems(&self) -> bool {
    !self.stems.is_empty()
  }

  pub fn add_stem(&mut self, stem: Stem) {
    self.stems.push(stem);
  }

  /// Reemplaza el conjunto completo de pistas (nunca se mezcla con el anterior).
  pub fn replace_stems(&mut self, stems: Vec<Stem>) {
    self.stems = stems;
    self.dedup_stems();
  }

  /// Elimina pistas con nombre repetido; gana la primera aparición.
  ///
  /// Devuelve cuántas se descartaron.
  pub fn dedup_stems(&mut self) -> usize {
    let before = self.stems.len();
    let mut seen = HashSet::new();
    self.stems.retain(|s| seen.insert(s.name.clone()));
    before - self.stems.len()
  }

  /// Mapa nombre -> ruta de las pistas. Con nombres repetidos gana la primera.
  pub fn stem_paths(&self) -> BTreeMap<String, PathBuf> {
    let mut map = BTreeMap::new();
    for stem in &self.stems {
      map.entry(stem.name.clone()).or_insert_with(|| stem.path.clone());
    }
    map
  }

  pub fn summary(&self) -> SongSummary {
    SongSummary {
      id: self.id.clone(),
      title: self.title.clone(),
      file_name: self.file_name().unwrap_or_default().to_string(),
      format: self.format.clone(),
      size_kb: self.size_bytes / 1024,
      uploaded_at: self.uploaded_at,
      stem_count: self.stems.len(),
    }
  }
}

/// Extensión en minúsculas como formato (mp3, wav, ...).
pub fn infer_format(path: &Path) -> Option<String> {
  path.extension().and_then(|e| e.to_str()).filter(|e| !e.is_empty()).map(|e| e.to_ascii_lowercase())
}
