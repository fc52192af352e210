pub mod identity;
pub mod song;
pub mod stem;

pub use identity::{ContentId, IdentityError};
pub use song::{Metadata, Song, SongSummary, infer_format};
pub use stem::Stem;
