//! Cross-replica verification and reconciliation.
//!
//! Two replicas of the same five-table schema (typically the local SQLite
//! store and a server-grade Postgres mirror) drift apart when one side
//! ingests while the other is offline. The verifier finds per-table count
//! discrepancies; the reconciler copies the missing rows toward the side
//! that is behind; the scheduler runs the pair on an interval.

mod reconciler;
mod replica;
mod scheduler;
mod table;
mod verifier;

pub use reconciler::{SyncOutcome, SyncReconciler};
pub use replica::{PgReplica, ReplicaConnection, SqliteReplica};
pub use scheduler::{CycleReport, SyncScheduler, SyncStatistics};
pub use table::{
    ArticleRecord, MappingRecord, PriceRecord, SentimentRecord, StockRecord, SyncTable,
    TableRecord,
};
pub use verifier::{Severity, SyncDiscrepancy, SyncVerifier};

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("replica query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("could not connect to replica: {0}")]
    Connect(String),
}

/// Run `op` up to `attempts` times, backing off briefly between tries.
///
/// Transient replica failures (lock contention, connection blips) are the
/// norm on the sync path; only the final failure is returned.
pub(crate) async fn with_retries<T, F, Fut>(
    attempts: u32,
    what: &str,
    mut op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(error = %e, attempt, operation = what, "retrying after failure");
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
