//! Startup ordering once config and ledger are in hand: wait for the chat session to report
//! ready, then hand control to the scheduler until shutdown.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::Config,
    ledger::DeliveryLedger,
    poller::{PollSettings, Poller},
    ports::{ChatSession, FeedFetcher, Notifier},
    scheduler::PollScheduler,
};

const READY_BACKOFF_START: Duration = Duration::from_secs(1);
const READY_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Collaborators wired by the binary.
pub struct Services {
    pub ledger: Arc<dyn DeliveryLedger>,
    pub fetcher: Arc<dyn FeedFetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub session: Arc<dyn ChatSession>,
}

/// Run the bot until `shutdown` is cancelled.
///
/// The ledger must already be open: no cycle can start before it is.
pub async fn run(cfg: &Config, services: Services, shutdown: CancellationToken) {
    let Some(identity) = wait_until_ready(services.session.as_ref(), &shutdown).await else {
        info!("shutdown requested before the chat session became ready");
        return;
    };
    info!(identity = %identity, channel = %cfg.channel_id, "chat session ready");

    let poller = Arc::new(Poller::new(
        PollSettings::from(cfg),
        services.ledger,
        services.fetcher,
        services.notifier,
    ));
    PollScheduler::new(poller, cfg.poll_interval)
        .run(shutdown)
        .await;
}

/// Retry `connect` with capped exponential backoff. `None` if shutdown won the race.
pub async fn wait_until_ready(
    session: &dyn ChatSession,
    shutdown: &CancellationToken,
) -> Option<String> {
    let mut delay = READY_BACKOFF_START;
    loop {
        tokio::select! {
          _ = shutdown.cancelled() => return None,
          res = session.connect() => match res {
            Ok(identity) => return Some(identity),
            Err(e) => warn!(
                retry_in_secs = delay.as_secs(),
                error = %e,
                "chat session not ready"
            ),
          }
        }

        tokio::select! {
          _ = shutdown.cancelled() => return None,
          _ = sleep(delay) => {}
        }
        delay = (delay * 2).min(READY_BACKOFF_MAX);
    }
}
