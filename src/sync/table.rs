//! The synced tables and their transferable row shapes.

use serde::Serialize;
use std::fmt;

/// Tables covered by verification and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SyncTable {
    Articles,
    Stocks,
    CompanyMappings,
    StockPrices,
    SentimentAnalysis,
}

impl SyncTable {
    /// Every synced table, in sync order. Articles first: mappings and
    /// sentiment rows reference symbols that article flow tends to surface.
    pub const ALL: [SyncTable; 5] = [
        SyncTable::Articles,
        SyncTable::Stocks,
        SyncTable::CompanyMappings,
        SyncTable::StockPrices,
        SyncTable::SentimentAnalysis,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            SyncTable::Articles => "news_articles",
            SyncTable::Stocks => "stocks",
            SyncTable::CompanyMappings => "company_mappings",
            SyncTable::StockPrices => "stock_prices",
            SyncTable::SentimentAnalysis => "sentiment_analysis",
        }
    }

    /// Column used for time-bounded fetches.
    pub(crate) fn time_column(&self) -> &'static str {
        match self {
            SyncTable::Articles => "created_at",
            SyncTable::Stocks => "updated_at",
            SyncTable::CompanyMappings => "created_at",
            SyncTable::StockPrices => "timestamp",
            SyncTable::SentimentAnalysis => "date",
        }
    }
}

impl fmt::Display for SyncTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ============================================================================
// Row shapes
// ============================================================================
//
// Ids are replica-local and never transferred; a copied record gets a fresh
// id on the receiving side. Identity across replicas is the natural key.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleRecord {
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

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRecord {
    pub symbol: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<String>,
    pub is_active: bool,
    pub is_etf: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MappingRecord {
    pub company_name: String,
    pub stock_symbol: String,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRecord {
    pub symbol: String,
    pub price: f64,
    pub volume: Option<i64>,
    pub timestamp: i64,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentRecord {
    pub symbol: String,
    pub date: i64,
    pub avg_sentiment: Option<f64>,
    pub sentiment_count: Option<i64>,
    pub positive_count: Option<i64>,
    pub negative_count: Option<i64>,
    pub neutral_count: Option<i64>,
    pub news_sentiment: Option<f64>,
}

/// One transferable row, tagged by table.
///
/// A tagged union instead of a stringly map: the compiler checks that every
/// sync path handles every table shape.
#[derive(Debug, Clone)]
pub enum TableRecord {
    Article(ArticleRecord),
    Stock(StockRecord),
    Mapping(MappingRecord),
    Price(PriceRecord),
    Sentiment(SentimentRecord),
}

impl TableRecord {
    pub fn table(&self) -> SyncTable {
        match self {
            TableRecord::Article(_) => SyncTable::Articles,
            TableRecord::Stock(_) => SyncTable::Stocks,
            TableRecord::Mapping(_) => SyncTable::CompanyMappings,
            TableRecord::Price(_) => SyncTable::StockPrices,
            TableRecord::Sentiment(_) => SyncTable::SentimentAnalysis,
        }
    }

    /// Identity of this row across replicas.
    ///
    /// `None` for an article without a URL: such a row cannot be matched to
    /// its counterpart and is skipped by reconciliation.
    pub fn natural_key(&self) -> Option<String> {
        match self {
            TableRecord::Article(a) => a.url.clone(),
            TableRecord::Stock(s) => Some(s.symbol.clone()),
            TableRecord::Mapping(m) => {
                Some(format!("{}\u{1f}{}", m.company_name, m.stock_symbol))
            }
            TableRecord::Price(p) => Some(format!("{}\u{1f}{}", p.symbol, p.timestamp)),
            TableRecord::Sentiment(s) => Some(format!("{}\u{1f}{}", s.symbol, s.date)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_covers_every_table_once() {
        let mut names: Vec<&str> = SyncTable::ALL.iter().map(SyncTable::table_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_article_without_url_has_no_key() {
        let record = TableRecord::Article(ArticleRecord {
            title: "t".into(),
            content: None,
            url: None,
            source: None,
            published_date: None,
            stock_symbol: "SPY".into(),
            sentiment_score: None,
            sentiment_label: None,
            created_at: 0,
        });
        assert_eq!(record.natural_key(), None);
    }

    #[test]
    fn test_composite_keys_do_not_collide() {
        // ("a", "bc") vs ("ab", "c") must not produce the same key.
        let m1 = TableRecord::Mapping(MappingRecord {
            company_name: "a".into(),
            stock_symbol: "bc".into(),
            is_active: true,
            created_at: 0,
        });
        let m2 = TableRecord::Mapping(MappingRecord {
            company_name: "ab".into(),
            stock_symbol: "c".into(),
            is_active: true,
            created_at: 0,
        });
        assert_ne!(m1.natural_key(), m2.natural_key());
    }
}
