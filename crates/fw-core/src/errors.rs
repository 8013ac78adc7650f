use std::path::PathBuf;

use crate::ledger::LedgerError;

/// Core error type for feedwatch.
///
/// Per-feed and per-entry failures use the boundary errors in [`crate::ports`] and are handled
/// inside the poll cycle. Anything that reaches this type is either fatal at startup (config,
/// ledger open) or fatal for a single cycle (ledger access).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
