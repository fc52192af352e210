use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longitud en caracteres hex de un digest SHA-256.
pub const CONTENT_ID_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
  #[error("content id must be {CONTENT_ID_HEX_LEN} hex chars, got {0}")]
  Length(usize),

  #[error("content id contains a non-hex character")]
  NotHex,
}

/// Identidad de contenido (`ContentId`): digest del contenido completo de un archivo.
///
/// Es la clave de deduplicación de canciones. Dos archivos con los mismos bytes
/// tienen siempre la misma identidad, sin importar nombre ni hora de subida.
/// Se guarda siempre en hex minúscula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
  /// Construye la identidad a partir de los bytes crudos del digest.
  pub fn from_digest(digest: impl AsRef<[u8]>) -> Self {
    ContentId(hex::encode(digest.as_ref()))
  }

  /// Valida y normaliza una identidad en texto (por ejemplo, leída del ledger).
  pub fn parse(s: &str) -> Result<Self, IdentityError> {
    let s = s.trim();
    if s.len() != CONTENT_ID_HEX_LEN {
      return Err(IdentityError::Length(s.len()));
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(IdentityError::NotHex);
    }
    Ok(ContentId(s.to_ascii_lowercase()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Prefijo corto para logs.
  pub fn short(&self) -> &str {
    &self.0[..self.0.len().min(16)]
  }
}

impl FromStr for ContentId {
  type Err = IdentityError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ContentId::parse(s)
  }
}

impl TryFrom<String> for ContentId {
  type Error = IdentityError;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    ContentId::parse(&s)
  }
}

impl From<ContentId> for String {
  fn from(id: ContentId) -> Self {
    id.0
  }
}

impl fmt::Display for ContentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}
