use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use remix_core::domain::{ContentId, IdentityError, Metadata, Song, Stem, infer_format};
use serde::{Deserialize, Deserializer, Serialize};

/// Registro persistido de una canción.
///
/// Los campos opcionales tienen default para aceptar registros escritos por
/// versiones anteriores; solo la identidad, el título y la ruta son obligatorios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
  pub content_id: String,
  pub title: String,
  pub source_path: PathBuf,
  #[serde(default)]
  pub format: Option<String>,
  #[serde(default)]
  pub size_bytes: u64,
  #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
  pub uploaded_at: DateTime<Utc>,
  #[serde(default)]
  pub stems: Vec<StemRecord>,
  #[serde(default)]
  pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StemRecord {
  pub name: String,
  pub path: PathBuf,
  #[serde(default)]
  pub duration_secs: Option<f64>,
  #[serde(default)]
  pub metadata: Metadata,
}

/// RFC 3339 o ISO-8601 sin zona (se asume UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
    return Some(ts.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
    .ok()
    .map(|naive| naive.and_utc())
}

impl From<&Song> for SongRecord {
  fn from(song: &Song) -> Self {
    Self {
      content_id: song.id.to_string(),
      title: song.title.clone(),
      source_path: song.source_path.clone(),
      format: song.format.clone(),
      size_bytes: song.size_bytes,
      uploaded_at: song.uploaded_at,
      stems: song.stems.iter().map(StemRecord::from).collect(),
      metadata: song.metadata.clone(),
    }
  }
}

impl From<&Stem> for StemRecord {
  fn from(stem: &Stem) -> Self {
    Self {
      name: stem.name.clone(),
      path: stem.path.clone(),
      duration_secs: stem.duration_secs,
      metadata: stem.metadata.clone(),
    }
  }
}

impl From<StemRecord> for Stem {
  fn from(r: StemRecord) -> Self {
    Stem { name: r.name, path: r.path, duration_secs: r.duration_secs, metadata: r.metadata }
  }
}

impl TryFrom<SongRecord> for Song {
  type Error = IdentityError;

  fn try_from(r: SongRecord) -> Result<Self, Self::Error> {
    let id = ContentId::parse(&r.content_id)?;
    let format = r.format.or_else(|| infer_format(&r.source_path));

    Ok(Song {
      id,
      title: r.title,
      source_path: r.source_path,
      format,
      size_bytes: r.size_bytes,
      uploaded_at: r.uploaded_at,
      stems: r.stems.into_iter().map(Stem::from).collect(),
      metadata: r.metadata,
    })
  }
}
