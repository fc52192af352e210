pub mod build_locks;
pub mod diagnostics;
pub mod integrity;
pub mod ledger;
pub mod orchestrator;
pub mod reconciler;

pub use build_locks::{BuildGuard, BuildLocks};
pub use diagnostics::{CacheReport, DiagnosticsReporter};
pub use integrity::{IntegrityProblem, IntegrityReport, IntegrityValidator, MIN_ARTIFACT_BYTES, ProblemKind};
pub use ledger::{ProjectLedger, SharedLedger};
pub use orchestrator::{
  CacheOrchestrator, CacheSettings, EnsureOutcome, RebuildSummary, RegisterOutcome, StemSource,
};
pub use reconciler::{CleanupReport, OrphanReconciler};
