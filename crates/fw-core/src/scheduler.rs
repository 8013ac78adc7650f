//! Fixed-interval driver for the poll cycle.
//!
//! - First cycle fires immediately, then every `period`.
//! - Cycles are awaited inline, so they never overlap; a tick missed while a cycle ran is
//!   deferred (`MissedTickBehavior::Delay`), not replayed in a burst.
//! - A failed cycle is logged and the loop carries on.
//! - Cancellation is observed between cycles only; an in-flight cycle always finishes.

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::poller::{CycleOutcome, Poller};

pub struct PollScheduler {
    poller: Arc<Poller>,
    period: Duration,
}

impl PollScheduler {
    pub fn new(poller: Arc<Poller>, period: Duration) -> Self {
        Self { poller, period }
    }

    /// Run until `cancel` fires. Returns the number of cycles triggered.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        info!(period_secs = self.period.as_secs(), "scheduler started");

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0u64;
        loop {
            tokio::select! {
              biased;
              _ = cancel.cancelled() => break,
              _ = tick.tick() => {
                cycles += 1;
                self.fire().await;
              }
            }
        }

        info!(cycles, "scheduler stopped");
        cycles
    }

    async fn fire(&self) {
        match self.poller.run_cycle().await {
            Ok(CycleOutcome::Completed(_))
            | Ok(CycleOutcome::ChannelUnavailable)
            | Ok(CycleOutcome::AlreadyRunning) => {}
            Err(e) => error!(error = %e, "poll cycle aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::ParsedFeed,
        poller::tests::{entry, feed, settings, BrokenLedger, FakeFetcher, FakeNotifier, MemLedger},
        ports::{FeedFetcher, FetchError},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(600);

    fn spawn_scheduler(
        poller: Arc<Poller>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<u64> {
        tokio::spawn(async move { PollScheduler::new(poller, PERIOD).run(cancel).await })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_every_period() {
        let fetcher = Arc::new(FakeFetcher::default().with_feed(
            "https://a.example/rss",
            feed("A", vec![entry("https://a.example/1", "Bluetooth", "")]),
        ));
        let notifier = Arc::new(FakeNotifier::default());
        let poller = Arc::new(Poller::new(
            settings(&["https://a.example/rss"]),
            Arc::new(MemLedger::default()),
            fetcher.clone(),
            notifier.clone(),
        ));
        let cancel = CancellationToken::new();
        let handle = spawn_scheduler(poller, cancel.clone());

        sleep(PERIOD * 2 + Duration::from_secs(1)).await;
        cancel.cancel();
        let cycles = handle.await.unwrap();

        assert_eq!(cycles, 3);
        assert_eq!(fetcher.calls().len(), 3);
        assert_eq!(notifier.sent_links(), vec!["https://a.example/1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_after_an_aborted_cycle() {
        let fetcher = Arc::new(FakeFetcher::default().with_feed(
            "https://a.example/rss",
            feed("A", vec![entry("https://a.example/1", "Bluetooth", "")]),
        ));
        let poller = Arc::new(Poller::new(
            settings(&["https://a.example/rss"]),
            Arc::new(BrokenLedger),
            fetcher.clone(),
            Arc::new(FakeNotifier::default()),
        ));
        let cancel = CancellationToken::new();
        let handle = spawn_scheduler(poller, cancel.clone());

        sleep(PERIOD + Duration::from_secs(1)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(fetcher.calls().len(), 2);
    }

    /// Fetcher that takes longer than the polling period and tracks overlap.
    #[derive(Default)]
    struct SlowFetcher {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<ParsedFeed, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            sleep(PERIOD + PERIOD / 2).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ParsedFeed::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_never_overlap() {
        let fetcher = Arc::new(SlowFetcher::default());
        let poller = Arc::new(Poller::new(
            settings(&["https://a.example/rss"]),
            Arc::new(MemLedger::default()),
            fetcher.clone(),
            Arc::new(FakeNotifier::default()),
        ));
        let cancel = CancellationToken::new();
        let handle = spawn_scheduler(poller, cancel.clone());

        sleep(PERIOD * 6).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(fetcher.max_active.load(Ordering::SeqCst), 1);
        let calls = fetcher.calls.load(Ordering::SeqCst);
        assert!((3..=5).contains(&calls), "calls = {calls}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_waits_for_the_running_cycle() {
        let fetcher = Arc::new(SlowFetcher::default());
        let poller = Arc::new(Poller::new(
            settings(&["https://a.example/rss"]),
            Arc::new(MemLedger::default()),
            fetcher.clone(),
            Arc::new(FakeNotifier::default()),
        ));
        let cancel = CancellationToken::new();
        let handle = spawn_scheduler(poller, cancel.clone());

        sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let start = tokio::time::Instant::now();
        assert_eq!(handle.await.unwrap(), 1);

        assert_eq!(fetcher.active.load(Ordering::SeqCst), 0);
        assert!(start.elapsed() >= PERIOD);
    }
}
