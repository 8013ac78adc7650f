//! Hexagonal ports for the collaborators the poll cycle depends on.
//!
//! Feed fetching and chat delivery live in adapter crates (`fw-feeds`, `fw-telegram`); the core
//! only sees these traits and their boundary error types.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{ChannelHandle, ChannelId, ParsedFeed},
    formatting::NotificationPayload,
};

/// Failure to fetch or parse a single feed. Recovered by skipping that feed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed feed: {0}")]
    Malformed(String),
}

/// Failure to resolve a channel or deliver a notification. Recovered by not recording the entry.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("rejected by chat platform: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Feed source adapter.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError>;
}

/// Delivery side of the chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Look up the destination channel. Called once per poll cycle.
    async fn resolve_channel(&self, id: ChannelId) -> Result<ChannelHandle, SendError>;

    async fn send(
        &self,
        channel: &ChannelHandle,
        payload: &NotificationPayload,
    ) -> Result<(), SendError>;
}

/// Session side of the chat platform.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Establish (or validate) the session. `Ok` is the "ready" signal; the value is the bot's
    /// display identity.
    async fn connect(&self) -> Result<String, SendError>;
}
