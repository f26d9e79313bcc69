//! Replica connections.
//!
//! A replica is one copy of the five-table schema. The trait is object-safe
//! so a scheduler can pair replicas of different backends (the usual
//! deployment: local SQLite paired with a server Postgres). SQL is written
//! per backend rather than abstracted: the placeholder styles differ and the
//! statements are short enough that sharing them would obscure more than it
//! saves.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};

use super::table::{
    ArticleRecord, MappingRecord, PriceRecord, SentimentRecord, StockRecord, SyncTable,
    TableRecord,
};
use super::SyncError;
use crate::storage::Database;

fn select_columns(table: SyncTable) -> &'static str {
    match table {
        SyncTable::Articles => {
            "title, content, url, source, published_date, stock_symbol, \
             sentiment_score, sentiment_label, created_at"
        }
        SyncTable::Stocks => {
            "symbol, company_name, sector, industry, market_cap, is_active, \
             is_etf, created_at, updated_at"
        }
        SyncTable::CompanyMappings => "company_name, stock_symbol, is_active, created_at",
        SyncTable::StockPrices => {
            "symbol, price, volume, timestamp, open_price, high_price, \
             low_price, close_price"
        }
        SyncTable::SentimentAnalysis => {
            "symbol, date, avg_sentiment, sentiment_count, positive_count, \
             negative_count, neutral_count, news_sentiment"
        }
    }
}

/// `SELECT ... FROM t [WHERE time >= <p1>] ORDER BY time` with the given
/// first-placeholder token (`?` or `$1`).
fn select_sql(table: SyncTable, filtered: bool, p1: &str) -> String {
    let cols = select_columns(table);
    let name = table.table_name();
    let time = table.time_column();
    if filtered {
        format!("SELECT {cols} FROM {name} WHERE {time} >= {p1} ORDER BY {time} ASC")
    } else {
        format!("SELECT {cols} FROM {name} ORDER BY {time} ASC")
    }
}

fn insert_sql(table: SyncTable, placeholders: &str) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        table.table_name(),
        select_columns(table),
        placeholders
    )
}

fn question_marks(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn dollar_signs(n: usize) -> String {
    (1..=n)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// ReplicaConnection
// ============================================================================

/// One side of a sync pair.
#[async_trait]
pub trait ReplicaConnection: Send + Sync {
    /// Short name used in logs and discrepancy details ("local", "remote").
    fn label(&self) -> &str;

    async fn count_rows(&self, table: SyncTable) -> Result<i64, SyncError>;

    /// All rows of `table`, optionally restricted to the table's time column
    /// being at or after `newer_than` (unix seconds).
    async fn fetch_records(
        &self,
        table: SyncTable,
        newer_than: Option<i64>,
    ) -> Result<Vec<TableRecord>, SyncError>;

    /// Natural keys of every identifiable row in `table`.
    async fn natural_keys(&self, table: SyncTable) -> Result<HashSet<String>, SyncError> {
        let records = self.fetch_records(table, None).await?;
        Ok(records
            .iter()
            .filter_map(TableRecord::natural_key)
            .collect())
    }

    /// URLs of the most recently created articles, newest first.
    async fn recent_article_urls(&self, limit: i64) -> Result<Vec<String>, SyncError>;

    async fn active_stock_count(&self) -> Result<i64, SyncError>;

    /// Insert `record` if its natural key is absent. Returns whether a row
    /// was actually written; a conflict is a quiet no-op.
    async fn upsert(&self, record: &TableRecord) -> Result<bool, SyncError>;
}

// ============================================================================
// SqliteReplica
// ============================================================================

pub struct SqliteReplica {
    label: String,
    pool: SqlitePool,
}

impl SqliteReplica {
    /// Wrap an already-open local store.
    pub fn from_database(label: impl Into<String>, db: &Database) -> Self {
        Self {
            label: label.into(),
            pool: db.pool().clone(),
        }
    }

    /// Open a standalone SQLite replica at `path`.
    pub async fn open(label: impl Into<String>, path: &str) -> Result<Self, SyncError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}?mode=rwc"))
            .map_err(|e| SyncError::Connect(e.to_string()))?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(if path == ":memory:" { 1 } else { 5 })
            .connect_with(options)
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        Ok(Self {
            label: label.into(),
            pool,
        })
    }
}

#[async_trait]
impl ReplicaConnection for SqliteReplica {
    fn label(&self) -> &str {
        &self.label
    }

    async fn count_rows(&self, table: SyncTable) -> Result<i64, SyncError> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.table_name()))
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn fetch_records(
        &self,
        table: SyncTable,
        newer_than: Option<i64>,
    ) -> Result<Vec<TableRecord>, SyncError> {
        let sql = select_sql(table, newer_than.is_some(), "?");
        macro_rules! fetch {
            ($row:ty, $wrap:expr) => {{
                let mut query = sqlx::query_as::<_, $row>(&sql);
                if let Some(since) = newer_than {
                    query = query.bind(since);
                }
                query
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .map($wrap)
                    .collect()
            }};
        }
        let records: Vec<TableRecord> = match table {
            SyncTable::Articles => fetch!(ArticleRecord, TableRecord::Article),
            SyncTable::Stocks => fetch!(StockRecord, TableRecord::Stock),
            SyncTable::CompanyMappings => fetch!(MappingRecord, TableRecord::Mapping),
            SyncTable::StockPrices => fetch!(PriceRecord, TableRecord::Price),
            SyncTable::SentimentAnalysis => fetch!(SentimentRecord, TableRecord::Sentiment),
        };
        Ok(records)
    }

    async fn recent_article_urls(&self, limit: i64) -> Result<Vec<String>, SyncError> {
        let urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM news_articles WHERE url IS NOT NULL \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    async fn active_stock_count(&self) -> Result<i64, SyncError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn upsert(&self, record: &TableRecord) -> Result<bool, SyncError> {
        let table = record.table();
        let result = match record {
            TableRecord::Article(a) => {
                sqlx::query(&insert_sql(table, &question_marks(9)))
                    .bind(&a.title)
                    .bind(&a.content)
                    .bind(&a.url)
                    .bind(&a.source)
                    .bind(a.published_date)
                    .bind(&a.stock_symbol)
                    .bind(a.sentiment_score)
                    .bind(&a.sentiment_label)
                    .bind(a.created_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Stock(s) => {
                sqlx::query(&insert_sql(table, &question_marks(9)))
                    .bind(&s.symbol)
                    .bind(&s.company_name)
                    .bind(&s.sector)
                    .bind(&s.industry)
                    .bind(&s.market_cap)
                    .bind(s.is_active)
                    .bind(s.is_etf)
                    .bind(s.created_at)
                    .bind(s.updated_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Mapping(m) => {
                sqlx::query(&insert_sql(table, &question_marks(4)))
                    .bind(&m.company_name)
                    .bind(&m.stock_symbol)
                    .bind(m.is_active)
                    .bind(m.created_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Price(p) => {
                sqlx::query(&insert_sql(table, &question_marks(8)))
                    .bind(&p.symbol)
                    .bind(p.price)
                    .bind(p.volume)
                    .bind(p.timestamp)
                    .bind(p.open_price)
                    .bind(p.high_price)
                    .bind(p.low_price)
                    .bind(p.close_price)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Sentiment(s) => {
                sqlx::query(&insert_sql(table, &question_marks(8)))
                    .bind(&s.symbol)
                    .bind(s.date)
                    .bind(s.avg_sentiment)
                    .bind(s.sentiment_count)
                    .bind(s.positive_count)
                    .bind(s.negative_count)
                    .bind(s.neutral_count)
                    .bind(s.news_sentiment)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// PgReplica
// ============================================================================

pub struct PgReplica {
    label: String,
    pool: PgPool,
}

impl PgReplica {
    pub async fn connect(label: impl Into<String>, url: &str) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        Ok(Self {
            label: label.into(),
            pool,
        })
    }
}

#[async_trait]
impl ReplicaConnection for PgReplica {
    fn label(&self) -> &str {
        &self.label
    }

    async fn count_rows(&self, table: SyncTable) -> Result<i64, SyncError> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.table_name()))
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn fetch_records(
        &self,
        table: SyncTable,
        newer_than: Option<i64>,
    ) -> Result<Vec<TableRecord>, SyncError> {
        let sql = select_sql(table, newer_than.is_some(), "$1");
        macro_rules! fetch {
            ($row:ty, $wrap:expr) => {{
                let mut query = sqlx::query_as::<_, $row>(&sql);
                if let Some(since) = newer_than {
                    query = query.bind(since);
                }
                query
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .map($wrap)
                    .collect()
            }};
        }
        let records: Vec<TableRecord> = match table {
            SyncTable::Articles => fetch!(ArticleRecord, TableRecord::Article),
            SyncTable::Stocks => fetch!(StockRecord, TableRecord::Stock),
            SyncTable::CompanyMappings => fetch!(MappingRecord, TableRecord::Mapping),
            SyncTable::StockPrices => fetch!(PriceRecord, TableRecord::Price),
            SyncTable::SentimentAnalysis => fetch!(SentimentRecord, TableRecord::Sentiment),
        };
        Ok(records)
    }

    async fn recent_article_urls(&self, limit: i64) -> Result<Vec<String>, SyncError> {
        let urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM news_articles WHERE url IS NOT NULL \
             ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    async fn active_stock_count(&self) -> Result<i64, SyncError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn upsert(&self, record: &TableRecord) -> Result<bool, SyncError> {
        let table = record.table();
        let result = match record {
            TableRecord::Article(a) => {
                sqlx::query(&insert_sql(table, &dollar_signs(9)))
                    .bind(&a.title)
                    .bind(&a.content)
                    .bind(&a.url)
                    .bind(&a.source)
                    .bind(a.published_date)
                    .bind(&a.stock_symbol)
                    .bind(a.sentiment_score)
                    .bind(&a.sentiment_label)
                    .bind(a.created_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Stock(s) => {
                sqlx::query(&insert_sql(table, &dollar_signs(9)))
                    .bind(&s.symbol)
                    .bind(&s.company_name)
                    .bind(&s.sector)
                    .bind(&s.industry)
                    .bind(&s.market_cap)
                    .bind(s.is_active)
                    .bind(s.is_etf)
                    .bind(s.created_at)
                    .bind(s.updated_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Mapping(m) => {
                sqlx::query(&insert_sql(table, &dollar_signs(4)))
                    .bind(&m.company_name)
                    .bind(&m.stock_symbol)
                    .bind(m.is_active)
                    .bind(m.created_at)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Price(p) => {
                sqlx::query(&insert_sql(table, &dollar_signs(8)))
                    .bind(&p.symbol)
                    .bind(p.price)
                    .bind(p.volume)
                    .bind(p.timestamp)
                    .bind(p.open_price)
                    .bind(p.high_price)
                    .bind(p.low_price)
                    .bind(p.close_price)
                    .execute(&self.pool)
                    .await?
            }
            TableRecord::Sentiment(s) => {
                sqlx::query(&insert_sql(table, &dollar_signs(8)))
                    .bind(&s.symbol)
                    .bind(s.date)
                    .bind(s.avg_sentiment)
                    .bind(s.sentiment_count)
                    .bind(s.positive_count)
                    .bind(s.negative_count)
                    .bind(s.neutral_count)
                    .bind(s.news_sentiment)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }
}
