use serde::Deserialize;

/// Destination chat id (numeric, may be negative for Telegram channels and groups).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub i64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved destination channel, valid for one poll cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: ChannelId,
    pub name: String,
}

/// A configured feed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub url: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One entry of a parsed feed. `link` doubles as the dedup key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub link: String,
    pub title: String,
    pub summary: String,
}

/// A fetched feed: its own title plus entries in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}
