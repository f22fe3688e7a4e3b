use crate::archive::{ArchiveStore, NewItem, StoreError};
use crate::config::TabPattern;
use crate::source::{HistorySource, SourceError, SourceSnapshot};
use chrono::{DateTime, Utc};

/// Errors that abort a save pass.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("archive error: {0}")]
    Store(#[from] StoreError),
}

/// Tabs a save pass must ignore.
#[derive(Debug, Clone, Default)]
pub struct TabFilter {
    exclude: Vec<TabPattern>,
}

impl TabFilter {
    pub fn new(exclude: Vec<TabPattern>) -> Self {
        Self { exclude }
    }

    pub fn allows(&self, tab: &str) -> bool {
        !self.exclude.iter().any(|p| p.matches(tab))
    }
}

/// Per-tab outcome of a save pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabStats {
    pub tab: String,
    pub observed: usize,
    pub inserted: usize,
}

/// Stats from one save pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub tabs: usize,
    pub excluded_tabs: usize,
    pub observed: usize,
    pub inserted: usize,
    pub already_archived: usize,
    /// Inserts rejected by the uniqueness constraint (same-pass repeats or a concurrent writer).
    pub duplicates: usize,
    pub per_tab: Vec<TabStats>,
}

/// Run one save pass: observe the source once, then archive every item not yet archived.
///
/// A source failure aborts before anything is written. Each insert commits on its
/// own, so an interrupted pass leaves a valid archive and re-running it is safe.
pub async fn save_pass<S: HistorySource>(
    source: &S,
    store: &ArchiveStore,
    filter: &TabFilter,
) -> Result<SaveStats, SaveError> {
    let snapshot = source.list_current_items().await?;
    tracing::debug!(tabs = snapshot.tabs.len(), items = snapshot.item_count(), "observed source");
    Ok(merge_snapshot(&snapshot, store, filter, Utc::now())?)
}

/// Archive the new items of an already-taken snapshot, stamping them `now`
/// (or later, if the archive already holds a later timestamp).
pub fn merge_snapshot(
    snapshot: &SourceSnapshot,
    store: &ArchiveStore,
    filter: &TabFilter,
    now: DateTime<Utc>,
) -> Result<SaveStats, StoreError> {
    let archived_at = store.pass_timestamp(now)?;
    let mut stats = SaveStats::default();

    for history in &snapshot.tabs {
        if !filter.allows(&history.tab) {
            tracing::debug!(tab = %history.tab, "tab excluded");
            stats.excluded_tabs += 1;
            continue;
        }
        stats.tabs += 1;

        let mut tab_stats = TabStats { tab: history.tab.clone(), observed: 0, inserted: 0 };
        for item in &history.items {
            tab_stats.observed += 1;

            if store.exists(&item.content, &history.tab)? {
                stats.already_archived += 1;
                continue;
            }

            let new_item = NewItem {
                tab: history.tab.clone(),
                content: item.content.clone(),
                source_rank: item.source_rank,
                archived_at,
            };
            match store.insert(&new_item) {
                Ok(_) => tab_stats.inserted += 1,
                Err(StoreError::Duplicate { .. }) => {
                    tracing::debug!(
                        tab = %history.tab,
                        rank = item.source_rank,
                        "already archived by another writer"
                    );
                    stats.duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            tab = %tab_stats.tab,
            observed = tab_stats.observed,
            inserted = tab_stats.inserted,
            "saved tab"
        );
        stats.observed += tab_stats.observed;
        stats.inserted += tab_stats.inserted;
        stats.per_tab.push(tab_stats);
    }

    Ok(stats)
}
