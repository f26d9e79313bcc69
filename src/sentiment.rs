//! Sentiment scoring seam.
//!
//! The engine never interprets sentiment; it stores whatever the scorer
//! produces alongside the article. The model behind the trait is out of
//! scope here and supplied by the caller.

/// Classification bucket attached to a scored article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Stored form, matching the `sentiment_label` column values already in
    /// the databases.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

/// A single scoring result: a value in `[-1, 1]` and its bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub value: f64,
    pub label: SentimentLabel,
}

/// Pluggable sentiment model.
///
/// Implementations must be cheap to call per article and safe to share
/// across tasks; the ingest path invokes this synchronously between the
/// duplicate check and the insert.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> SentimentScore;
}
