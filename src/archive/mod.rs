pub mod store;
pub mod search;
pub mod types;

pub use search::SearchQuery;
pub use store::{ArchiveStore, StoreError};
pub use types::*;
