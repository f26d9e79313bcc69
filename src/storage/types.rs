use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another process has the database locked
    #[error("The article database is locked by another process. Please close it and try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StorageError::Locked;
        }

        StorageError::Other(err)
    }
}

// ============================================================================
// Insert Outcome
// ============================================================================

/// Result of an article insert.
///
/// A URL uniqueness violation is routine control flow on the ingest path
/// (two near-simultaneous fetches of the same story), not a failure, so it
/// gets its own variant rather than an error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row inserted; carries the assigned id.
    Inserted(i64),
    /// An article with this URL is already present.
    AlreadyExists,
}

// ============================================================================
// Data Structures
// ============================================================================

/// News article row from the `news_articles` table.
///
/// `created_at` is assigned at insert and never changes; it is the tie-break
/// for keep-oldest duplicate policies. `url` is unique (post-cleanup) when
/// non-null.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_date: Option<i64>,
    pub stock_symbol: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
    pub created_at: i64,
}

/// An article as produced by the (external) feed collector, before it has
/// been deduplicated and assigned an id.
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_date: Option<i64>,
    pub stock_symbol: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
}
