//! HTTP feed adapter: fetches RSS/RDF/Atom documents and reduces them to [`ParsedFeed`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fw_core::{
    domain::ParsedFeed,
    errors::Error,
    ports::{FeedFetcher, FetchError},
    Result,
};

mod parser;
mod text;

pub use parser::parse_feed;
pub use text::plain_text;

const USER_AGENT: &str = concat!("feedwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct HttpFeedFetcher {
    http: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError> {
        let started = Instant::now();
        tracing::debug!(url, "fetching feed");

        let resp = self
            .http
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let feed = parse_feed(&body, url)?;
        tracing::debug!(
            url,
            entries = feed.entries.len(),
            bytes = body.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "feed fetched"
        );
        Ok(feed)
    }
}
