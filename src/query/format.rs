use crate::archive::ArchivedItem;
use chrono::{Local, TimeZone};
use std::fmt::Display;

const TIME_FORMAT: &str = "%B %d, %Y @ %I:%M:%S %p";
const RULE: &str = "-----";

/// Render a search hit for the terminal, timestamp in local time.
/// `number` is the 1-based position in the result list.
pub fn format_item(number: usize, item: &ArchivedItem) -> String {
    format_item_in(number, item, &Local)
}

pub fn format_item_in<Tz>(number: usize, item: &ArchivedItem, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = item.archived_at.with_timezone(tz).format(TIME_FORMAT);
    format!(
        "{RULE} Item {number} from {tab} on {time} {RULE}\n{content}\n",
        tab = item.tab,
        content = item.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn header_then_content() {
        let item = ArchivedItem {
            id: 7,
            tab: "work".to_string(),
            content: "line one\nline two".to_string(),
            archived_at: Utc.with_ymd_and_hms(2024, 5, 1, 21, 4, 9).single().unwrap_or_default(),
        };
        assert_eq!(
            format_item_in(3, &item, &Utc),
            "----- Item 3 from work on May 01, 2024 @ 09:04:09 PM -----\nline one\nline two\n"
        );
    }
}
