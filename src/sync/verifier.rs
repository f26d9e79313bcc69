//! Per-table count verification between two replicas.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use super::replica::ReplicaConnection;
use super::table::SyncTable;
use super::with_retries;

/// How far apart the replicas are on one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_difference(difference: i64) -> Self {
        match difference {
            0..=5 => Severity::Low,
            6..=20 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

/// One table where the replicas disagree. Equal counts never produce one.
#[derive(Debug, Clone, Serialize)]
pub struct SyncDiscrepancy {
    pub table: SyncTable,
    pub count_a: i64,
    pub count_b: i64,
    pub difference: i64,
    pub severity: Severity,
    /// Table-specific diagnostics, keyed for stable report ordering.
    pub details: BTreeMap<String, String>,
}

// ============================================================================
// SyncVerifier
// ============================================================================

/// Compares row counts table by table.
#[derive(Debug, Clone)]
pub struct SyncVerifier {
    max_attempts: u32,
}

impl Default for SyncVerifier {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl SyncVerifier {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Compare `a` and `b` over `tables`.
    ///
    /// A table whose counts cannot be read (after retries) is logged and
    /// skipped; verification of the remaining tables proceeds. Infallible by
    /// design: the caller always gets whatever could be measured.
    pub async fn verify(
        &self,
        a: &dyn ReplicaConnection,
        b: &dyn ReplicaConnection,
        tables: &[SyncTable],
    ) -> Vec<SyncDiscrepancy> {
        let mut discrepancies = Vec::new();

        for &table in tables {
            let count_a =
                with_retries(self.max_attempts, table.table_name(), || a.count_rows(table)).await;
            let count_b =
                with_retries(self.max_attempts, table.table_name(), || b.count_rows(table)).await;
            let (count_a, count_b) = match (count_a, count_b) {
                (Ok(ca), Ok(cb)) => (ca, cb),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(table = %table, error = %e, "count unavailable; skipping table");
                    continue;
                }
            };

            if count_a == count_b {
                continue;
            }

            let difference = (count_a - count_b).abs();
            let severity = Severity::from_difference(difference);
            info!(
                table = %table,
                count_a, count_b, difference, ?severity,
                "replica counts differ"
            );

            discrepancies.push(SyncDiscrepancy {
                table,
                count_a,
                count_b,
                difference,
                severity,
                details: self.collect_details(a, b, table).await,
            });
        }

        discrepancies
    }

    /// Extra diagnostics for the report. Failures here degrade to an empty
    /// map; details never block verification.
    async fn collect_details(
        &self,
        a: &dyn ReplicaConnection,
        b: &dyn ReplicaConnection,
        table: SyncTable,
    ) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        match table {
            SyncTable::Articles => {
                let urls_a = match a.recent_article_urls(10).await {
                    Ok(urls) => urls.into_iter().collect::<BTreeSet<_>>(),
                    Err(e) => {
                        warn!(error = %e, replica = a.label(), "recent URLs unavailable");
                        return details;
                    }
                };
                let urls_b = match b.recent_article_urls(10).await {
                    Ok(urls) => urls.into_iter().collect::<BTreeSet<_>>(),
                    Err(e) => {
                        warn!(error = %e, replica = b.label(), "recent URLs unavailable");
                        return details;
                    }
                };
                let only_a: Vec<&str> =
                    urls_a.difference(&urls_b).map(String::as_str).collect();
                let only_b: Vec<&str> =
                    urls_b.difference(&urls_a).map(String::as_str).collect();
                details.insert(
                    format!("urls_only_in_{}", a.label()),
                    only_a.join(", "),
                );
                details.insert(
                    format!("urls_only_in_{}", b.label()),
                    only_b.join(", "),
                );
            }
            SyncTable::Stocks => {
                for replica in [a, b] {
                    match replica.active_stock_count().await {
                        Ok(active) => {
                            details.insert(
                                format!("active_in_{}", replica.label()),
                                active.to_string(),
                            );
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                replica = replica.label(),
                                "active stock count unavailable"
                            );
                        }
                    }
                }
            }
            _ => {}
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_buckets() {
        assert_eq!(Severity::from_difference(0), Severity::Low);
        assert_eq!(Severity::from_difference(5), Severity::Low);
        assert_eq!(Severity::from_difference(6), Severity::Medium);
        assert_eq!(Severity::from_difference(20), Severity::Medium);
        assert_eq!(Severity::from_difference(21), Severity::High);
        assert_eq!(Severity::from_difference(5000), Severity::High);
    }
}
