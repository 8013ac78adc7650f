use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    domain::{ChannelId, FeedSource},
    errors::Error,
    Result,
};

/// Feeds polled when neither `FEEDS_FILE` nor `FEED_URLS` is set.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://feeds.feedburner.com/TheHackersNews",
    "https://www.bleepingcomputer.com/feed/",
    "https://nvd.nist.gov/feeds/xml/cve/misc/nvd-rss.xml",
];

pub const DEFAULT_KEYWORD: &str = "bluetooth";

/// Typed configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // Chat
    pub telegram_bot_token: String,
    pub channel_id: ChannelId,

    // Feeds + filter
    pub feeds: Vec<FeedSource>,
    pub keyword: String,

    // Timing
    pub poll_interval: Duration,
    pub delivery_pause: Duration,
    pub fetch_timeout: Duration,

    // Storage
    pub ledger_path: PathBuf,

    // Channel resolution failures tolerated before logging escalates to error level.
    pub channel_failure_escalate_after: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("feeds", &self.feeds)
            .field("keyword", &self.keyword)
            .field("poll_interval", &self.poll_interval)
            .field("delivery_pause", &self.delivery_pause)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("ledger_path", &self.ledger_path)
            .field(
                "channel_failure_escalate_after",
                &self.channel_failure_escalate_after,
            )
            .finish()
    }
}

#[derive(Deserialize)]
struct FeedsFile {
    feeds: Vec<FeedSource>,
}

impl Config {
    /// Load from the process environment, after merging `.env` (existing vars win).
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let channel_raw = get("CHANNEL_ID").and_then(non_empty).ok_or_else(|| {
            Error::Config("CHANNEL_ID environment variable is required".to_string())
        })?;
        let channel_id = ChannelId(parse_num::<i64>("CHANNEL_ID", &channel_raw)?);

        let feeds = match get("FEEDS_FILE").and_then(non_empty) {
            Some(path) => load_feeds_file(Path::new(&path))?,
            None => match get("FEED_URLS").and_then(non_empty) {
                Some(csv) => parse_csv(&csv).into_iter().map(FeedSource::new).collect(),
                None => DEFAULT_FEEDS.iter().map(|u| FeedSource::new(*u)).collect(),
            },
        };
        if feeds.is_empty() {
            return Err(Error::Config("feed list is empty".to_string()));
        }

        let keyword = get("KEYWORD").unwrap_or_else(|| DEFAULT_KEYWORD.to_string());
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(Error::Config("KEYWORD must not be blank".to_string()));
        }

        let poll_interval = Duration::from_secs(env_num(&get, "POLL_INTERVAL_SECS")?.unwrap_or(600));
        if poll_interval.is_zero() {
            return Err(Error::Config(
                "POLL_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        let delivery_pause =
            Duration::from_millis(env_num(&get, "DELIVERY_PAUSE_MS")?.unwrap_or(1000));
        let fetch_timeout = Duration::from_secs(env_num(&get, "FETCH_TIMEOUT_SECS")?.unwrap_or(30));

        let ledger_path = PathBuf::from(
            get("LEDGER_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "feedwatch.db".to_string()),
        );

        let channel_failure_escalate_after =
            env_num(&get, "CHANNEL_FAILURE_ESCALATE_AFTER")?.unwrap_or(6);

        Ok(Self {
            telegram_bot_token,
            channel_id,
            feeds,
            keyword,
            poll_interval,
            delivery_pause,
            fetch_timeout,
            ledger_path,
            channel_failure_escalate_after,
        })
    }
}

fn load_feeds_file(path: &Path) -> Result<Vec<FeedSource>> {
    let contents = fs::read_to_string(path).map_err(|e| Error::InvalidPath {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let parsed: FeedsFile = serde_json::from_str(&contents)?;
    Ok(parsed
        .feeds
        .into_iter()
        .map(|f| FeedSource::new(f.url.trim()))
        .filter(|f| !f.url.is_empty())
        .collect())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match get(key).and_then(non_empty) {
        Some(raw) => parse_num(key, &raw).map(Some),
        None => Ok(None),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got {raw:?}")))
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
