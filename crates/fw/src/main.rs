use std::sync::Arc;

use fw_core::{
    config::Config,
    ledger::SqliteLedger,
    lifecycle::{self, Services},
};
use fw_feeds::HttpFeedFetcher;
use fw_telegram::TelegramNotifier;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), fw_core::Error> {
    // Config first so a RUST_LOG from .env reaches the subscriber.
    let cfg = Config::load()?;
    fw_core::logging::init("fw")?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let ledger = SqliteLedger::open(&cfg.ledger_path)?;
    tracing::info!(delivered = ledger.len().await?, "delivery ledger ready");

    let fetcher = HttpFeedFetcher::new(cfg.fetch_timeout)?;
    let telegram = Arc::new(TelegramNotifier::from_token(cfg.telegram_bot_token.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
            }
        });
    }

    let services = Services {
        ledger: Arc::new(ledger),
        fetcher: Arc::new(fetcher),
        notifier: telegram.clone(),
        session: telegram,
    };
    lifecycle::run(&cfg, services, shutdown).await;

    tracing::info!("stopped");
    Ok(())
}
