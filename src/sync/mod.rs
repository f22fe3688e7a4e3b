//! Merging source observations into the archive.

pub mod merge;

pub use merge::{merge_snapshot, save_pass, SaveError, SaveStats, TabFilter, TabStats};
