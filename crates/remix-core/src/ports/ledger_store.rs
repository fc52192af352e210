use crate::domain::Song;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
  #[error("io error: {0}")]
  Io(String),

  /// El archivo entero es ilegible; los registros sueltos corruptos no llegan aquí.
  #[error("corrupt ledger: {0}")]
  Corrupt(String),
}

/// Registro descartado durante la carga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
  pub index: usize,
  pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedLedger {
  pub songs: Vec<Song>,
  pub skipped: Vec<SkippedRecord>,
}

/// Almacenamiento durable del ledger.
///
/// `save` reescribe el estado completo de forma atómica. `load` devuelve
/// `Ok(None)` si no hay estado previo (primer arranque o archivo vacío).
pub trait LedgerStore: Send + Sync {
  fn load(&self) -> Result<Option<LoadedLedger>, LedgerError>;
  fn save(&self, songs: &[Song]) -> Result<(), LedgerError>;
}
