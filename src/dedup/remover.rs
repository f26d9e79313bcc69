//! Batch duplicate removal over the whole article table.
//!
//! The ingest-time detector only sees a recency window; this pass walks the
//! entire store oldest-first and keeps exactly one survivor per URL and per
//! content fingerprint. Dry-run is the default at the CLI.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::fingerprint::fingerprint;
use crate::storage::{Database, StorageError};

/// Classification and removal counts for one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub total_articles: u64,
    pub url_duplicates: u64,
    pub content_duplicates: u64,
    /// Rows actually deleted. Stays 0 on a dry run.
    pub removed_articles: u64,
}

impl CleanupStats {
    pub fn marked(&self) -> u64 {
        self.url_duplicates + self.content_duplicates
    }
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("duplicate scan failed: {0}")]
    Scan(#[from] StorageError),

    /// The delete batch failed and rolled back. `stats` still reflects what
    /// the scan classified; nothing was removed.
    #[error("duplicate removal failed after marking {} article(s)", .stats.marked())]
    RemovalFailed {
        stats: CleanupStats,
        #[source]
        source: StorageError,
    },
}

/// Report what a cleanup would remove without touching any rows.
pub async fn analyze(db: &Database) -> Result<CleanupStats, CleanupError> {
    scan_and_remove(db, true).await
}

/// Scan for duplicates and, unless `dry_run`, delete them in one transaction.
///
/// Articles are visited oldest first (`created_at`, then id), so the first
/// occurrence of each URL or fingerprint survives. A row whose URL was
/// already seen counts as a URL duplicate only; its fingerprint is not
/// recorded, so an identical body under a fresh URL is still caught later.
pub async fn scan_and_remove(db: &Database, dry_run: bool) -> Result<CleanupStats, CleanupError> {
    let articles = db.all_articles_ordered().await?;

    let mut stats = CleanupStats {
        total_articles: articles.len() as u64,
        ..Default::default()
    };
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_hashes: HashSet<String> = HashSet::new();
    let mut to_remove: Vec<i64> = Vec::new();

    for article in &articles {
        if let Some(url) = article.url.as_deref() {
            if !seen_urls.insert(url.to_string()) {
                stats.url_duplicates += 1;
                to_remove.push(article.id);
                continue;
            }
        }

        let hash = fingerprint(&article.title, article.content.as_deref().unwrap_or(""));
        if !seen_hashes.insert(hash) {
            stats.content_duplicates += 1;
            to_remove.push(article.id);
        }
    }

    info!(
        total = stats.total_articles,
        url_duplicates = stats.url_duplicates,
        content_duplicates = stats.content_duplicates,
        dry_run,
        "duplicate scan complete"
    );

    if dry_run || to_remove.is_empty() {
        return Ok(stats);
    }

    match db.delete_articles(&to_remove).await {
        Ok(deleted) => stats.removed_articles = deleted,
        Err(source) => return Err(CleanupError::RemovalFailed { stats, source }),
    }

    // With the duplicates gone, URL uniqueness can be enforced going forward.
    if let Err(e) = db.ensure_url_unique_index().await {
        warn!(error = %e, "could not create unique URL index after cleanup");
    }

    Ok(stats)
}
