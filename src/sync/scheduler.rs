//! Periodic sync driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::reconciler::{SyncOutcome, SyncReconciler};
use super::replica::ReplicaConnection;
use super::table::SyncTable;
use super::verifier::SyncVerifier;

/// Running totals for one scheduler instance.
///
/// Owned by the scheduler, snapshot by value; there is no process-global
/// statistics state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatistics {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub discrepancies_found: u64,
    pub records_synced: u64,
    /// Unix seconds of the last completed verification, if any.
    pub last_verification: Option<i64>,
    /// Unix seconds of the last reconciliation attempt, if any.
    pub last_sync: Option<i64>,
}

/// What one cycle did.
#[derive(Debug, Clone)]
pub enum CycleReport {
    /// Another cycle was already in flight; this trigger was dropped.
    Skipped,
    /// Verification found the replicas in agreement.
    Clean,
    /// Discrepancies were found and reconciliation ran.
    Synced {
        discrepancies: usize,
        outcome: SyncOutcome,
    },
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Pairs two replicas and runs verify-then-reconcile cycles.
///
/// One cycle at a time: a trigger that arrives while a cycle is in flight is
/// dropped, not queued. Manual `verify`/`sync` CLI paths reuse `run_cycle`,
/// so interval and manual runs cannot stack either.
pub struct SyncScheduler {
    a: Arc<dyn ReplicaConnection>,
    b: Arc<dyn ReplicaConnection>,
    verifier: SyncVerifier,
    reconciler: SyncReconciler,
    interval: Duration,
    running: AtomicBool,
    stats: Mutex<SyncStatistics>,
}

impl SyncScheduler {
    pub fn new(
        a: Arc<dyn ReplicaConnection>,
        b: Arc<dyn ReplicaConnection>,
        interval_minutes: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            a,
            b,
            verifier: SyncVerifier::new(max_attempts),
            reconciler: SyncReconciler::new(max_attempts),
            // A zero period would panic `tokio::time::interval`; the floor
            // keeps a sloppy config file from aborting watch mode.
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
            running: AtomicBool::new(false),
            stats: Mutex::new(SyncStatistics::default()),
        }
    }

    /// Snapshot of the statistics so far.
    pub fn statistics(&self) -> SyncStatistics {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one verify-then-reconcile cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync cycle already in flight; dropping trigger");
            return CycleReport::Skipped;
        }
        let report = self.cycle_inner().await;
        self.running.store(false, Ordering::Release);
        report
    }

    async fn cycle_inner(&self) -> CycleReport {
        let discrepancies = self
            .verifier
            .verify(self.a.as_ref(), self.b.as_ref(), &SyncTable::ALL)
            .await;
        let verified_at = Utc::now().timestamp();

        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.last_verification = Some(verified_at);
            stats.discrepancies_found += discrepancies.len() as u64;
        }

        if discrepancies.is_empty() {
            debug!("replicas in agreement");
            return CycleReport::Clean;
        }

        let outcome = self
            .reconciler
            .reconcile(self.a.as_ref(), self.b.as_ref(), &discrepancies)
            .await;
        info!(
            discrepancies = discrepancies.len(),
            records = outcome.records_synced,
            success = outcome.success,
            "sync cycle finished"
        );

        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.total_syncs += 1;
            if outcome.success {
                stats.successful_syncs += 1;
            } else {
                stats.failed_syncs += 1;
            }
            stats.records_synced += outcome.records_synced;
            stats.last_sync = Some(Utc::now().timestamp());
        }

        CycleReport::Synced {
            discrepancies: discrepancies.len(),
            outcome,
        }
    }

    /// Run cycles forever on the configured interval. The first cycle starts
    /// immediately. Intended to be raced against a shutdown signal.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }
}
