#![no_main]

use chrono::Utc;
use copyq_archive::archive::{ArchiveStore, NewItem, SearchQuery};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else { return };
    let Ok(store) = ArchiveStore::in_memory() else { return };

    let content = format!("<{input}>");
    let item = NewItem {
        tab: "fuzz".to_string(),
        content: content.clone(),
        source_rank: 0,
        archived_at: Utc::now(),
    };
    if store.insert(&item).is_err() {
        return;
    }

    // Any text must be searchable without error, and an item always contains itself
    let hits = match store.search(&SearchQuery::new(input)) {
        Ok(hits) => hits,
        Err(e) => panic!("search failed for {input:?}: {e}"),
    };
    assert!(hits.iter().any(|h| h.content == content), "{input:?} not found in itself");

    let scoped = store.search(&SearchQuery::new(input).in_tab("fuzz"));
    assert!(scoped.is_ok(), "{scoped:?}");
});
