use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An item about to be archived, as observed in one save pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub tab: String,
    pub content: String,
    /// Position in the source at observation time (0 = most recent). Not persisted.
    pub source_rank: usize,
    pub archived_at: DateTime<Utc>,
}

/// A record in the archive. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedItem {
    /// Insertion sequence number.
    pub id: i64,
    pub tab: String,
    pub content: String,
    pub archived_at: DateTime<Utc>,
}

/// Aggregate counts over the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub items: u64,
    pub distinct_contents: u64,
    pub tabs: u64,
}

pub(crate) fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_round_trip_keeps_precision() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).single().unwrap_or_default()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(from_micros(to_micros(ts)), ts);
    }
}
