pub mod loader;
pub mod types;

pub use loader::{ArchiveConfig, CopyQConfig};
pub use types::*;
