use crate::archive::{ArchiveStats, ArchiveStore, ArchivedItem, SearchQuery, StoreError};
use std::ops::ControlFlow;

/// Errors surfaced to the caller of a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown tab '{tab}'{}", did_you_mean(.suggestion))]
    UnknownTab { tab: String, suggestion: Option<String> },

    #[error("archive error: {0}")]
    Store(#[from] StoreError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default()
}

/// Minimum Jaro-Winkler similarity for a tab suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Read-side operations over an archive.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a ArchiveStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a ArchiveStore) -> Self {
        Self { store }
    }

    /// Matches across all tabs, most recently archived first.
    pub fn search(&self, text: &str) -> Result<Vec<ArchivedItem>, QueryError> {
        Ok(self.store.search(&SearchQuery::new(text))?)
    }

    /// Matches within one tab. Fails with `UnknownTab` rather than returning nothing
    /// when the tab has never been archived.
    pub fn search_tab(&self, tab: &str, text: &str) -> Result<Vec<ArchivedItem>, QueryError> {
        self.ensure_tab(tab)?;
        Ok(self.store.search(&SearchQuery::new(text).in_tab(tab))?)
    }

    /// Streaming form of `search` / `search_tab`. Returns the number of items visited.
    pub fn search_with<F>(
        &self,
        text: &str,
        tab: Option<&str>,
        visit: F,
    ) -> Result<usize, QueryError>
    where
        F: FnMut(ArchivedItem) -> ControlFlow<()>,
    {
        let mut query = SearchQuery::new(text);
        if let Some(tab) = tab {
            self.ensure_tab(tab)?;
            query = query.in_tab(tab);
        }
        Ok(self.store.search_with(&query, visit)?)
    }

    /// Archived tab names, sorted.
    pub fn tabs(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.store.list_tabs()?.into_iter().collect())
    }

    pub fn stats(&self) -> Result<ArchiveStats, QueryError> {
        Ok(self.store.stats()?)
    }

    fn ensure_tab(&self, tab: &str) -> Result<(), QueryError> {
        if self.store.has_tab(tab)? {
            return Ok(());
        }
        let known = self.store.list_tabs()?;
        Err(QueryError::UnknownTab {
            tab: tab.to_string(),
            suggestion: closest_tab(tab, known.iter().map(String::as_str)),
        })
    }
}

fn closest_tab<'t>(tab: &str, known: impl Iterator<Item = &'t str>) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for candidate in known {
        let similarity = strsim::jaro_winkler(tab, candidate);
        if similarity > SUGGESTION_THRESHOLD && best.is_none_or(|(score, _)| similarity > score) {
            best = Some((similarity, candidate));
        }
    }
    best.map(|(_, name)| name.to_string())
}
