use anyhow::Result;
use chrono::Utc;
use sqlx::QueryBuilder;
use std::collections::BTreeMap;

use super::db::Database;
use super::types::{Article, ArticleDraft, InsertOutcome, StorageError};

/// SQLite limits bound parameters per statement; stay well under it when
/// deleting by id list.
const DELETE_CHUNK: usize = 500;

// ============================================================================
// Article Operations
// ============================================================================

impl Database {
    /// Insert an article, treating a URL collision as a routine outcome.
    ///
    /// `created_at` is stamped here, not by the caller, so the keep-oldest
    /// ordering reflects arrival at the store.
    pub async fn insert_article(
        &self,
        draft: &ArticleDraft,
    ) -> Result<InsertOutcome, StorageError> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO news_articles
                (title, content, url, source, published_date, stock_symbol,
                 sentiment_score, sentiment_label, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.url)
        .bind(&draft.source)
        .bind(draft.published_date)
        .bind(&draft.stock_symbol)
        .bind(draft.sentiment_score)
        .bind(&draft.sentiment_label)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_rowid())),
            Err(e) => {
                let unique = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if unique {
                    Ok(InsertOutcome::AlreadyExists)
                } else {
                    Err(StorageError::from_sqlx(e))
                }
            }
        }
    }

    /// Look up an article by exact URL.
    pub async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>, StorageError> {
        let article = sqlx::query_as::<_, Article>(
            "SELECT * FROM news_articles WHERE url = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(article)
    }

    /// Articles for one symbol created at or after `since` (unix seconds),
    /// oldest first. This is the candidate set for similarity comparison at
    /// ingest time.
    pub async fn articles_for_symbol_since(
        &self,
        symbol: &str,
        since: i64,
    ) -> Result<Vec<Article>, StorageError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM news_articles
            WHERE stock_symbol = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
        "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(articles)
    }

    /// Every article, oldest first with id as tie-break.
    ///
    /// The cleanup scan depends on this ordering: the first article seen for
    /// a given URL or fingerprint is the one that survives.
    pub async fn all_articles_ordered(&self) -> Result<Vec<Article>, StorageError> {
        let articles = sqlx::query_as::<_, Article>(
            "SELECT * FROM news_articles ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(articles)
    }

    /// Delete articles by id in a single transaction.
    ///
    /// All-or-nothing: if any chunk fails the transaction rolls back and no
    /// articles are removed. Returns the number of rows deleted.
    pub async fn delete_articles(&self, ids: &[i64]) -> Result<u64, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(StorageError::from_sqlx)?;
        let mut deleted = 0u64;

        for chunk in ids.chunks(DELETE_CHUNK) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("DELETE FROM news_articles WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from_sqlx)?;
            deleted += result.rows_affected();
        }

        tx.commit().await.map_err(StorageError::from_sqlx)?;
        Ok(deleted)
    }

    /// Total article count.
    pub async fn article_count(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(count)
    }

    /// Article counts grouped by source, for the status report.
    pub async fn article_counts_by_source(&self) -> Result<BTreeMap<String, i64>, StorageError> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) FROM news_articles GROUP BY source",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(rows
            .into_iter()
            .map(|(source, n)| (source.unwrap_or_else(|| "(unknown)".to_string()), n))
            .collect())
    }

    /// Article counts grouped by stock symbol, for the status report.
    pub async fn article_counts_by_symbol(&self) -> Result<BTreeMap<String, i64>, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT stock_symbol, COUNT(*) FROM news_articles GROUP BY stock_symbol",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(rows.into_iter().collect())
    }
}
