//! Read-only access to the clipboard manager's current history.

pub mod copyq;

pub use copyq::CopyQSource;

use std::future::Future;

/// Errors from querying the history source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("clipboard source unavailable: {0}")]
    Unavailable(String),
}

/// One text item as the source currently shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub content: String,
    /// Row in the source tab, 0 = most recent.
    pub source_rank: usize,
}

/// Current items of one tab, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHistory {
    pub tab: String,
    pub items: Vec<SourceItem>,
}

/// Snapshot of every tab, in the order the source lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub tabs: Vec<TabHistory>,
}

impl SourceSnapshot {
    pub fn item_count(&self) -> usize {
        self.tabs.iter().map(|t| t.items.len()).sum()
    }
}

/// A clipboard manager whose history can be observed without mutating it.
pub trait HistorySource {
    /// Tab names, in the source's own order.
    fn list_tabs(&self) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send;

    /// Every in-scope tab with its current items. All-or-nothing: any failure fails the call.
    fn list_current_items(
        &self,
    ) -> impl Future<Output = Result<SourceSnapshot, SourceError>> + Send;
}
