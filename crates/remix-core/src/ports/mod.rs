pub mod artifacts;
pub mod fingerprint;
pub mod ledger_store;
pub mod separator;

pub use artifacts::{ArtifactError, ArtifactFile, ArtifactStore};
pub use fingerprint::Fingerprinter;
pub use ledger_store::{LedgerError, LedgerStore, LoadedLedger, SkippedRecord};
pub use separator::{SeparatedStems, SeparationError, StemSeparator};
