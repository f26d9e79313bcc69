use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the local article store (SQLite).
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Locked` if another process has the database
    /// locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `StorageError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // the cleanup pass and live ingestion.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::from_sqlx)?
            .pragma("busy_timeout", "5000");

        // An in-memory SQLite database exists per connection; a pool of more
        // than one would hand out empty databases.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                StorageError::Locked
            } else {
                StorageError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All schema statements use `IF NOT EXISTS` for idempotency, so
    /// re-running on an existing database is a no-op. Column names match the
    /// pre-existing stores bit-for-bit; any reimplementation must keep them
    /// to stay interoperable with stored data.
    async fn migrate(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_articles (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT,
                url TEXT,
                source TEXT,
                published_date INTEGER,
                stock_symbol TEXT NOT NULL,
                sentiment_score REAL,
                sentiment_label TEXT,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                id INTEGER PRIMARY KEY,
                symbol TEXT NOT NULL UNIQUE,
                company_name TEXT NOT NULL,
                sector TEXT,
                industry TEXT,
                market_cap TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_etf INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS company_mappings (
                id INTEGER PRIMARY KEY,
                company_name TEXT NOT NULL,
                stock_symbol TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                UNIQUE(company_name, stock_symbol)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_prices (
                id INTEGER PRIMARY KEY,
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                volume INTEGER,
                timestamp INTEGER NOT NULL,
                open_price REAL,
                high_price REAL,
                low_price REAL,
                close_price REAL,
                UNIQUE(symbol, timestamp)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sentiment_analysis (
                id INTEGER PRIMARY KEY,
                symbol TEXT NOT NULL,
                date INTEGER NOT NULL,
                avg_sentiment REAL,
                sentiment_count INTEGER,
                positive_count INTEGER,
                negative_count INTEGER,
                neutral_count INTEGER,
                news_sentiment REAL,
                UNIQUE(symbol, date)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Composite index for the ingest-time similarity window: filters by
        // stock_symbol and created_at range.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_symbol_created \
             ON news_articles(stock_symbol, created_at)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_created ON news_articles(created_at)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // The unique URL index cannot be created while legacy duplicates
        // exist; tolerate failure here and let the cleanup pass recreate it.
        if let Err(e) = self.ensure_url_unique_index().await {
            tracing::warn!(
                error = %e,
                "Could not enforce URL uniqueness; run cleanup to remove duplicates first"
            );
        }

        Ok(())
    }

    /// Access the underlying connection pool.
    ///
    /// The sync layer runs its own queries against the same database; it
    /// borrows the pool rather than opening a second connection.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the partial unique index on `news_articles.url`.
    ///
    /// Fails if duplicate non-null URLs are present. The cleanup pass calls
    /// this after a successful removal so future duplicates are rejected at
    /// insert time.
    pub async fn ensure_url_unique_index(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_news_articles_url \
             ON news_articles(url) WHERE url IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
