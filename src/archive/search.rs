use crate::archive::store::{ArchiveStore, StoreError};
use crate::archive::types::{from_micros, ArchivedItem};
use std::borrow::Cow;
use std::ops::ControlFlow;

/// Shortest query the trigram index can answer; shorter ones scan with LIKE.
const MIN_INDEXED_CHARS: usize = 3;

/// Search query parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Substring to look for. Matched case-insensitively for ASCII, like SQL `LIKE`.
    pub text: String,
    /// Restrict to one tab. None = all tabs.
    pub tab: Option<String>,
    /// Maximum number of results. 0 = unlimited.
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string(), ..Default::default() }
    }

    pub fn in_tab(mut self, tab: &str) -> Self {
        self.tab = Some(tab.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn uses_index(&self) -> bool {
        self.text.chars().count() >= MIN_INDEXED_CHARS
    }
}

impl ArchiveStore {
    /// Stream matches to `visit`, most recently archived first, ties in insertion order.
    /// Returns the number of items visited. Each call re-runs the query.
    pub fn search_with<F>(&self, q: &SearchQuery, mut visit: F) -> Result<usize, StoreError>
    where
        F: FnMut(ArchivedItem) -> ControlFlow<()>,
    {
        // SQL narrows on the NUL-free copy; the exact rule is applied to `content` below
        let needle = search_text(&q.text);
        let mut sql = String::from(
            "SELECT id, tab, content, archived_at FROM items WHERE search_text LIKE ?1 ESCAPE '\\'",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        params.push(Box::new(like_pattern(&needle)));

        if q.uses_index() {
            sql.push_str(&format!(
                " AND id IN (SELECT rowid FROM items_fts WHERE items_fts MATCH ?{})",
                params.len() + 1
            ));
            params.push(Box::new(fts_phrase(&needle)));
        }

        if let Some(ref tab) = q.tab {
            sql.push_str(&format!(" AND tab = ?{}", params.len() + 1));
            params.push(Box::new(tab.clone()));
        }

        sql.push_str(" ORDER BY archived_at DESC, id ASC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(ArchivedItem {
                id: row.get(0)?,
                tab: row.get(1)?,
                content: row.get(2)?,
                archived_at: from_micros(row.get(3)?),
            })
        })?;

        let mut visited = 0;
        for row in rows {
            let item = row?;
            if !contains_ignore_ascii_case(&item.content, &q.text) {
                continue;
            }
            visited += 1;
            if visit(item).is_break() || visited == q.limit {
                break;
            }
        }
        Ok(visited)
    }

    /// Collect all matches for `q`.
    pub fn search(&self, q: &SearchQuery) -> Result<Vec<ArchivedItem>, StoreError> {
        let mut results = Vec::new();
        self.search_with(q, |item| {
            results.push(item);
            ControlFlow::Continue(())
        })?;
        Ok(results)
    }
}

/// `%text%` with LIKE wildcards in `text` escaped by backslash.
pub fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Text as stored in `search_text`: NUL becomes U+FFFD, everything else is kept.
/// Substrings survive the mapping, so narrowing on it never drops a real match.
pub(crate) fn search_text(text: &str) -> Cow<'_, str> {
    if text.contains('\0') {
        Cow::Owned(text.replace('\0', "\u{FFFD}"))
    } else {
        Cow::Borrowed(text)
    }
}

/// The match rule: `needle` occurs in `haystack`, ignoring ASCII case only.
pub fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let (h, n) = (haystack.as_bytes(), needle.as_bytes());
    n.is_empty() || h.windows(n.len()).any(|w| w.eq_ignore_ascii_case(n))
}

/// Quote `text` as a single FTS5 phrase.
pub fn fts_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}
