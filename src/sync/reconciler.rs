//! Copies missing rows toward the replica that is behind.

use chrono::Utc;
use tracing::{info, warn};

use super::replica::ReplicaConnection;
use super::table::SyncTable;
use super::verifier::SyncDiscrepancy;
use super::with_retries;

/// Prices older than this are not reconciled; a gap that old is historical
/// backfill territory, not replication lag.
const PRICE_SYNC_DAYS: i64 = 7;

/// What one reconciliation pass accomplished.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    /// False when at least one table could not be reconciled at all.
    /// Individual record failures do not flip this.
    pub success: bool,
    pub records_synced: u64,
}

// ============================================================================
// SyncReconciler
// ============================================================================

/// Resolves verified discrepancies by copying rows from the replica with
/// more of them.
///
/// Larger-count-wins is a lag heuristic: it assumes the smaller side is
/// behind, not that the sides truly diverged. Rows are matched by natural
/// key and copied with conflict-ignoring inserts, so re-running against
/// converged replicas writes nothing.
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    max_attempts: u32,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl SyncReconciler {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub async fn reconcile(
        &self,
        a: &dyn ReplicaConnection,
        b: &dyn ReplicaConnection,
        discrepancies: &[SyncDiscrepancy],
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            success: true,
            records_synced: 0,
        };

        for discrepancy in discrepancies {
            let (source, target) = if discrepancy.count_a >= discrepancy.count_b {
                (a, b)
            } else {
                (b, a)
            };
            match self
                .sync_table(source, target, discrepancy.table)
                .await
            {
                Ok(copied) => {
                    info!(
                        table = %discrepancy.table,
                        from = source.label(),
                        to = target.label(),
                        copied,
                        "table reconciled"
                    );
                    outcome.records_synced += copied;
                }
                Err(e) => {
                    warn!(
                        table = %discrepancy.table,
                        from = source.label(),
                        to = target.label(),
                        error = %e,
                        "table reconciliation failed"
                    );
                    outcome.success = false;
                }
            }
        }

        outcome
    }

    /// Copy rows present in `source` but missing from `target`.
    async fn sync_table(
        &self,
        source: &dyn ReplicaConnection,
        target: &dyn ReplicaConnection,
        table: SyncTable,
    ) -> Result<u64, super::SyncError> {
        let newer_than = (table == SyncTable::StockPrices)
            .then(|| Utc::now().timestamp() - PRICE_SYNC_DAYS * 86_400);

        let records = with_retries(self.max_attempts, table.table_name(), || {
            source.fetch_records(table, newer_than)
        })
        .await?;
        let existing = with_retries(self.max_attempts, table.table_name(), || {
            target.natural_keys(table)
        })
        .await?;

        let mut copied = 0u64;
        for record in &records {
            let Some(key) = record.natural_key() else {
                // Unidentifiable rows (articles without URLs) cannot be
                // matched across replicas.
                continue;
            };
            if existing.contains(&key) {
                continue;
            }
            match target.upsert(record).await {
                Ok(true) => copied += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(table = %table, key = %key, error = %e, "record copy failed; skipping");
                }
            }
        }

        Ok(copied)
    }
}
