//! Search and listing over the archive.

pub mod engine;
pub mod format;

pub use engine::{QueryEngine, QueryError};
pub use format::format_item;
