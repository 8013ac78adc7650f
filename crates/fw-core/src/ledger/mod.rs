//! Durable record of delivered entry links.
//!
//! # Invariants
//! - A link is present iff a notification for it was handed to the notifier successfully.
//! - `record` is idempotent: a second insert of the same link is a no-op.
//! - Append-only: the core never updates or deletes rows.

use async_trait::async_trait;

pub mod migrations;
mod sqlite;

pub use sqlite::SqliteLedger;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("ledger connection lock poisoned")]
    Poisoned,

    #[error("ledger task failed: {0}")]
    Join(String),
}

/// Membership check + idempotent insert over delivered links.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    async fn has(&self, link: &str) -> Result<bool, LedgerError>;

    async fn record(&self, link: &str) -> Result<(), LedgerError>;
}
