pub mod config;
mod demucs;
mod probe;

pub use config::SeparatorConfig;
pub use demucs::DemucsSeparator;
pub use probe::{ToolStatus, probe_tool};
