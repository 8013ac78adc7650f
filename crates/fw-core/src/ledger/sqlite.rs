use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info};

use super::{migrations::apply_migrations, DeliveryLedger, LedgerError};

/// SQLite-backed ledger.
///
/// A single connection behind a mutex: one writer at a time, which is all a single poll worker
/// needs. Blocking SQLite calls run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open (or create) the ledger file and bring its schema up to date.
    ///
    /// Safe to call on every startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let started_at = Instant::now();

        let ledger = Connection::open(path)
            .map_err(LedgerError::from)
            .and_then(Self::bootstrap);
        match &ledger {
            Ok(_) => info!(
                path = %path.display(),
                duration_ms = started_at.elapsed().as_millis() as u64,
                "ledger opened"
            ),
            Err(e) => error!(
                path = %path.display(),
                duration_ms = started_at.elapsed().as_millis() as u64,
                error = %e,
                "ledger open failed"
            ),
        }
        ledger
    }

    /// In-memory ledger. Loses everything on drop; meant for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> Result<Self, LedgerError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of delivered links on record.
    pub async fn len(&self) -> Result<u64, LedgerError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM deliveries", [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| LedgerError::Join(e.to_string()))?
    }
}

#[async_trait]
impl DeliveryLedger for SqliteLedger {
    async fn has(&self, link: &str) -> Result<bool, LedgerError> {
        let link = link.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM deliveries WHERE link = ?1",
                    params![link],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn record(&self, link: &str) -> Result<(), LedgerError> {
        let link = link.to_string();
        let delivered_at = chrono::Utc::now().to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO deliveries (link, delivered_at) VALUES (?1, ?2)
                 ON CONFLICT(link) DO NOTHING",
                params![link, delivered_at],
            )?;
            Ok(())
        })
        .await
    }
}
