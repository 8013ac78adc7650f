//! One poll cycle: fetch every feed, filter, dedup against the ledger, notify, record.
//!
//! Failure policy:
//! - a feed that fails to fetch/parse is logged and skipped;
//! - a send that fails is logged and the entry is left unrecorded (retried next cycle);
//! - a ledger fault aborts the cycle, since dedup can no longer be trusted.
//!
//! Delivery is at-least-once: if the process dies after a successful send but before the
//! ledger write, that entry is sent again on a later cycle.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    domain::{ChannelHandle, ChannelId, FeedSource, ParsedFeed},
    formatting::NotificationPayload,
    ledger::DeliveryLedger,
    matcher,
    ports::{FeedFetcher, Notifier},
    Result,
};

/// The subset of [`Config`] a poll cycle needs.
#[derive(Clone, Debug)]
pub struct PollSettings {
    pub feeds: Vec<FeedSource>,
    pub keyword: String,
    pub channel_id: ChannelId,
    pub delivery_pause: Duration,
    pub channel_failure_escalate_after: u32,
}

impl From<&Config> for PollSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            feeds: cfg.feeds.clone(),
            keyword: cfg.keyword.clone(),
            channel_id: cfg.channel_id,
            delivery_pause: cfg.delivery_pause,
            channel_failure_escalate_after: cfg.channel_failure_escalate_after,
        }
    }
}

/// Counters for one completed cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
    pub matched: usize,
    pub already_delivered: usize,
    pub delivered: usize,
    pub send_failures: usize,
    pub malformed_entries: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// The destination channel could not be resolved; nothing was fetched or sent.
    ChannelUnavailable,
    /// Another cycle was still in flight; this call did nothing.
    AlreadyRunning,
}

pub struct Poller {
    settings: PollSettings,
    ledger: Arc<dyn DeliveryLedger>,
    fetcher: Arc<dyn FeedFetcher>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<()>,
    channel_failures: AtomicU32,
}

impl Poller {
    pub fn new(
        settings: PollSettings,
        ledger: Arc<dyn DeliveryLedger>,
        fetcher: Arc<dyn FeedFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            ledger,
            fetcher,
            notifier,
            in_flight: Mutex::new(()),
            channel_failures: AtomicU32::new(0),
        }
    }

    /// Consecutive cycles that failed to resolve the channel.
    pub fn channel_failures(&self) -> u32 {
        self.channel_failures.load(Ordering::SeqCst)
    }

    /// Run one full pass over the configured feeds.
    ///
    /// Returns `Err` only for ledger faults. At most one cycle runs at a time.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("poll cycle already in flight, skipping trigger");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let Some(channel) = self.resolve_channel().await else {
            return Ok(CycleOutcome::ChannelUnavailable);
        };

        info!(
            channel = %channel.name,
            feeds = self.settings.feeds.len(),
            keyword = %self.settings.keyword,
            "checking feeds"
        );

        let mut report = CycleReport::default();
        for feed in &self.settings.feeds {
            let parsed = match self.fetcher.fetch(&feed.url).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(feed = %feed.url, error = %e, "failed to fetch or parse feed");
                    report.feeds_failed += 1;
                    continue;
                }
            };
            report.feeds_fetched += 1;
            debug!(feed = %feed.url, entries = parsed.entries.len(), "feed fetched");

            self.process_feed(&channel, &parsed, &mut report).await?;
        }

        info!(
            fetched = report.feeds_fetched,
            failed = report.feeds_failed,
            matched = report.matched,
            already_delivered = report.already_delivered,
            delivered = report.delivered,
            send_failures = report.send_failures,
            "poll cycle finished"
        );
        Ok(CycleOutcome::Completed(report))
    }

    async fn resolve_channel(&self) -> Option<ChannelHandle> {
        let id = self.settings.channel_id;
        match self.notifier.resolve_channel(id).await {
            Ok(handle) => {
                let previous = self.channel_failures.swap(0, Ordering::SeqCst);
                if previous > 0 {
                    info!(channel = %id, after_failures = previous, "channel resolvable again");
                }
                Some(handle)
            }
            Err(e) => {
                let failures = self.channel_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.settings.channel_failure_escalate_after {
                    error!(
                        channel = %id,
                        consecutive_failures = failures,
                        error = %e,
                        "channel still unresolvable, skipping poll cycle"
                    );
                } else {
                    warn!(
                        channel = %id,
                        consecutive_failures = failures,
                        error = %e,
                        "channel not found, skipping poll cycle"
                    );
                }
                None
            }
        }
    }

    async fn process_feed(
        &self,
        channel: &ChannelHandle,
        feed: &ParsedFeed,
        report: &mut CycleReport,
    ) -> Result<()> {
        for entry in &feed.entries {
            if !matcher::matches(entry, &self.settings.keyword) {
                continue;
            }
            report.matched += 1;

            if entry.link.trim().is_empty() {
                warn!(title = %entry.title, source = %feed.title, "matching entry has no link");
                report.malformed_entries += 1;
                continue;
            }

            if self.ledger.has(&entry.link).await? {
                report.already_delivered += 1;
                continue;
            }

            info!(link = %entry.link, title = %entry.title, "new matching entry");
            let payload = NotificationPayload::from_entry(entry, &feed.title);
            if let Err(e) = self.notifier.send(channel, &payload).await {
                warn!(link = %entry.link, error = %e, "delivery failed, will retry next cycle");
                report.send_failures += 1;
                continue;
            }

            // A crash between the send above and this write re-sends the entry later.
            self.ledger.record(&entry.link).await?;
            report.delivered += 1;

            if !self.settings.delivery_pause.is_zero() {
                sleep(self.settings.delivery_pause).await;
            }
        }
        Ok(())
    }
}
