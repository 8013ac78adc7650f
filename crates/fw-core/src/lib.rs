//! Core of the feed-watch bot: durable delivery ledger, keyword matcher, poll cycle and
//! scheduler.
//!
//! This crate is framework-agnostic. Feed fetching and the chat platform live behind ports
//! (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod matcher;
pub mod poller;
pub mod ports;
pub mod scheduler;

pub use errors::{Error, Result};
