//! Duplicate detection and removal for incoming news articles.

mod detector;
pub mod fingerprint;
pub mod normalize;
mod remover;
pub mod similarity;

pub use detector::{DuplicateDetector, DuplicateKind, DuplicateVerdict};
pub use remover::{analyze, scan_and_remove, CleanupError, CleanupStats};

use tracing::debug;

use crate::sentiment::SentimentScorer;
use crate::storage::{ArticleDraft, Database, InsertOutcome, StorageError};

/// Result of pushing one article through the ingest path.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Inserted { id: i64 },
    Duplicate(DuplicateVerdict),
}

/// Check, score, and store one incoming article.
///
/// A `SentimentScorer`, when supplied, fills in `sentiment_score` and
/// `sentiment_label` for drafts that arrive unscored. An `AlreadyExists`
/// from the store means another writer won a race on the same URL between
/// our check and our insert; that is a duplicate, not an error.
pub async fn ingest(
    db: &Database,
    detector: &DuplicateDetector,
    scorer: Option<&dyn SentimentScorer>,
    draft: &ArticleDraft,
) -> Result<IngestOutcome, StorageError> {
    let verdict = detector.check(draft, db).await;
    if verdict.is_duplicate() {
        debug!(reason = %verdict.reason, "skipping duplicate");
        return Ok(IngestOutcome::Duplicate(verdict));
    }

    let mut draft = draft.clone();
    if let Some(scorer) = scorer {
        if draft.sentiment_score.is_none() {
            let text = format!(
                "{} {}",
                draft.title,
                draft.content.as_deref().unwrap_or("")
            );
            let scored = scorer.score(&text);
            draft.sentiment_score = Some(scored.value);
            draft.sentiment_label = Some(scored.label.as_str().to_string());
        }
    }

    match db.insert_article(&draft).await? {
        InsertOutcome::Inserted(id) => Ok(IngestOutcome::Inserted { id }),
        InsertOutcome::AlreadyExists => Ok(IngestOutcome::Duplicate(DuplicateVerdict {
            kind: Some(DuplicateKind::Url),
            matched: Vec::new(),
            reason: "lost insert race on url".to_string(),
        })),
    }
}
