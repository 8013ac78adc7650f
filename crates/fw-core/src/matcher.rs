//! Keyword filter.

use crate::domain::FeedEntry;

/// Case-insensitive substring match of `keyword` against the entry's title or summary.
pub fn matches(entry: &FeedEntry, keyword: &str) -> bool {
    let needle = keyword.to_lowercase();
    entry.title.to_lowercase().contains(&needle) || entry.summary.to_lowercase().contains(&needle)
}
