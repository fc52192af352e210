pub mod artifacts;
pub mod async_walker;
pub mod fingerprint;
mod io;

pub use artifacts::FsArtifactStore;
pub use fingerprint::{ContentFingerprinter, DEFAULT_CHUNK_BYTES, fingerprint_file};
pub use io::{atomic_write, atomic_write_str};
