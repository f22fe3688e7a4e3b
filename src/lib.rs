//! Unbounded archive for CopyQ clipboard history.
//!
//! CopyQ keeps a fixed number of items per tab and evicts the oldest. A save pass
//! reads what CopyQ currently holds and archives every `(content, tab)` pair not
//! seen before into SQLite; queries then run against the whole accumulated archive.

pub mod archive;
pub mod config;
pub mod logging;
pub mod query;
pub mod source;
pub mod sync;
