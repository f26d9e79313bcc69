//! Ingest-time duplicate detection.

use chrono::Utc;
use tracing::{debug, warn};

use super::fingerprint::fingerprint;
use super::similarity::{content_similarity, title_similarity};
use crate::storage::{ArticleDraft, Database};

/// How a duplicate was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Exact URL already present (any age).
    Url,
    /// Identical content fingerprint within the recency window, despite a
    /// different (or missing) URL. Strictly stronger than `Similarity`.
    Fingerprint,
    /// Title or body similarity above threshold within the recency window.
    Similarity,
}

/// Outcome of a duplicate check. Never persisted; produced fresh per check.
#[derive(Debug, Clone)]
pub struct DuplicateVerdict {
    pub kind: Option<DuplicateKind>,
    /// Ids of existing articles this candidate duplicates, in the order the
    /// store returned them (oldest first).
    pub matched: Vec<i64>,
    pub reason: String,
}

impl DuplicateVerdict {
    pub fn is_duplicate(&self) -> bool {
        self.kind.is_some()
    }

    fn not_duplicate(reason: impl Into<String>) -> Self {
        Self {
            kind: None,
            matched: Vec::new(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// DuplicateDetector
// ============================================================================

/// Checks a candidate article against the store before insert.
///
/// Two passes: an unbounded exact-URL lookup, then similarity scoring against
/// same-symbol articles created within the trailing window. The URL check
/// deliberately ignores the window: the same link resurfacing a week later is
/// still the same story.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    title_threshold: f64,
    content_threshold: f64,
    window_hours: i64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self {
            title_threshold: 0.9,
            content_threshold: 0.8,
            window_hours: 24,
        }
    }
}

impl DuplicateDetector {
    pub fn new(title_threshold: f64, content_threshold: f64, window_hours: i64) -> Self {
        Self {
            title_threshold,
            content_threshold,
            window_hours,
        }
    }

    /// Decide whether `candidate` duplicates an article already stored.
    ///
    /// Store errors on this path degrade to "not a duplicate" with a warning:
    /// detection is advisory, and the URL uniqueness constraint remains the
    /// final authority at insert time.
    pub async fn check(&self, candidate: &ArticleDraft, db: &Database) -> DuplicateVerdict {
        if let Some(url) = candidate.url.as_deref() {
            match db.find_article_by_url(url).await {
                Ok(Some(existing)) => {
                    return DuplicateVerdict {
                        kind: Some(DuplicateKind::Url),
                        matched: vec![existing.id],
                        reason: format!("url already stored as article {}", existing.id),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, url, "URL duplicate check failed; treating as new");
                    return DuplicateVerdict::not_duplicate("url check unavailable");
                }
            }
        }

        let since = Utc::now().timestamp() - self.window_hours * 3600;
        let recent = match db
            .articles_for_symbol_since(&candidate.stock_symbol, since)
            .await
        {
            Ok(articles) => articles,
            Err(e) => {
                warn!(
                    error = %e,
                    symbol = %candidate.stock_symbol,
                    "similarity window query failed; treating as new"
                );
                return DuplicateVerdict::not_duplicate("similarity check unavailable");
            }
        };

        let candidate_content = candidate.content.as_deref().unwrap_or("");
        let candidate_print = fingerprint(&candidate.title, candidate_content);
        let mut exact = Vec::new();
        let mut matched = Vec::new();
        for existing in &recent {
            let existing_content = existing.content.as_deref().unwrap_or("");
            // An identical fingerprint would also clear the title threshold;
            // classify it as the exact copy it is instead of a near-match.
            if fingerprint(&existing.title, existing_content) == candidate_print {
                exact.push(existing.id);
                continue;
            }
            let title_sim = title_similarity(&candidate.title, &existing.title);
            let content_sim = content_similarity(candidate_content, existing_content);
            if title_sim >= self.title_threshold || content_sim >= self.content_threshold {
                debug!(
                    existing = existing.id,
                    title_sim, content_sim, "similarity match"
                );
                matched.push(existing.id);
            }
        }

        if !exact.is_empty() {
            let reason = format!(
                "identical content to {} recent article(s) for {}",
                exact.len(),
                candidate.stock_symbol
            );
            return DuplicateVerdict {
                kind: Some(DuplicateKind::Fingerprint),
                matched: exact,
                reason,
            };
        }

        if matched.is_empty() {
            DuplicateVerdict::not_duplicate("no match")
        } else {
            let reason = format!(
                "similar to {} recent article(s) for {}",
                matched.len(),
                candidate.stock_symbol
            );
            DuplicateVerdict {
                kind: Some(DuplicateKind::Similarity),
                matched,
                reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InsertOutcome;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn draft(title: &str, content: &str, url: Option<&str>, symbol: &str) -> ArticleDraft {
        ArticleDraft {
            title: title.to_string(),
            content: Some(content.to_string()),
            url: url.map(str::to_string),
            stock_symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_article_is_not_duplicate() {
        let db = test_db().await;
        let detector = DuplicateDetector::default();
        let verdict = detector
            .check(
                &draft("Fed raises rates", "A body.", Some("https://x.test/1"), "SPY"),
                &db,
            )
            .await;
        assert!(!verdict.is_duplicate());
        assert!(verdict.matched.is_empty());
    }

    #[tokio::test]
    async fn test_url_match_short_circuits() {
        let db = test_db().await;
        let stored = draft(
            "Fed raises rates",
            "The central bank moved.",
            Some("https://x.test/1"),
            "SPY",
        );
        let id = match db.insert_article(&stored).await.unwrap() {
            InsertOutcome::Inserted(id) => id,
            other => panic!("expected insert, got {other:?}"),
        };

        // Different title and symbol; same URL still wins.
        let candidate = draft("Totally unrelated", "Different text.", Some("https://x.test/1"), "AAPL");
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert_eq!(verdict.kind, Some(DuplicateKind::Url));
        assert_eq!(verdict.matched, vec![id]);
    }

    #[tokio::test]
    async fn test_similar_title_within_window() {
        let db = test_db().await;
        let stored = draft(
            "Apple beats earnings estimates",
            "Strong quarter on iphone demand across several emerging markets.",
            Some("https://a.test/1"),
            "AAPL",
        );
        let id = match db.insert_article(&stored).await.unwrap() {
            InsertOutcome::Inserted(id) => id,
            other => panic!("expected insert, got {other:?}"),
        };

        let candidate = draft(
            "Apple beats earnings estimate",
            "A completely different write-up of the results announcement today.",
            Some("https://b.test/2"),
            "AAPL",
        );
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert_eq!(verdict.kind, Some(DuplicateKind::Similarity));
        assert_eq!(verdict.matched, vec![id]);
    }

    #[tokio::test]
    async fn test_exact_copy_under_new_url_is_fingerprint_kind() {
        let db = test_db().await;
        let stored = draft(
            "Fed raises rates",
            "The central bank moved today.",
            Some("https://a.test/1"),
            "SPY",
        );
        let id = match db.insert_article(&stored).await.unwrap() {
            InsertOutcome::Inserted(id) => id,
            other => panic!("expected insert, got {other:?}"),
        };

        // Same story verbatim modulo casing and punctuation, republished
        // under a fresh URL.
        let candidate = draft(
            "Fed Raises Rates!",
            "The central bank moved, today",
            Some("https://b.test/2"),
            "SPY",
        );
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert_eq!(verdict.kind, Some(DuplicateKind::Fingerprint));
        assert_eq!(verdict.matched, vec![id]);
    }

    #[tokio::test]
    async fn test_other_symbol_is_outside_scope() {
        let db = test_db().await;
        db.insert_article(&draft(
            "Apple beats earnings estimates",
            "Strong quarter on iphone demand across several emerging markets.",
            Some("https://a.test/1"),
            "AAPL",
        ))
        .await
        .unwrap();

        // Identical title, different symbol: not compared.
        let candidate = draft(
            "Apple beats earnings estimates",
            "Strong quarter on iphone demand across several emerging markets.",
            Some("https://b.test/2"),
            "MSFT",
        );
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert!(!verdict.is_duplicate());
    }

    #[tokio::test]
    async fn test_old_article_is_outside_window() {
        let db = test_db().await;

        // Insert directly with a created_at two days back; insert_article
        // always stamps now.
        sqlx::query(
            "INSERT INTO news_articles (title, content, url, stock_symbol, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind("Apple beats earnings estimates")
        .bind("Strong quarter on iphone demand across several emerging markets.")
        .bind("https://a.test/1")
        .bind("AAPL")
        .bind(Utc::now().timestamp() - 48 * 3600)
        .execute(db.pool())
        .await
        .unwrap();

        let candidate = draft(
            "Apple beats earnings estimates",
            "Strong quarter on iphone demand across several emerging markets.",
            Some("https://b.test/2"),
            "AAPL",
        );
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert!(!verdict.is_duplicate(), "48h-old article is outside the 24h window");
    }

    #[tokio::test]
    async fn test_collects_all_similarity_matches() {
        let db = test_db().await;
        let mut ids = Vec::new();
        for url in ["https://a.test/1", "https://a.test/2"] {
            let stored = draft(
                "Apple beats earnings estimates",
                "Strong quarter on iphone demand across several emerging markets.",
                Some(url),
                "AAPL",
            );
            match db.insert_article(&stored).await.unwrap() {
                InsertOutcome::Inserted(id) => ids.push(id),
                other => panic!("expected insert, got {other:?}"),
            }
        }

        let candidate = draft(
            "Apple beats earnings estimate",
            "Unrelated body text for this particular candidate article.",
            None,
            "AAPL",
        );
        let verdict = DuplicateDetector::default().check(&candidate, &db).await;
        assert_eq!(verdict.kind, Some(DuplicateKind::Similarity));
        assert_eq!(verdict.matched, ids);
    }
}
