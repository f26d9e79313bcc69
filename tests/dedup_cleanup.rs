//! End-to-end duplicate detection and cleanup scenarios.

use chrono::Utc;
use pretty_assertions::assert_eq;

use marketpulse::dedup::{
    self, DuplicateDetector, DuplicateKind, IngestOutcome,
};
use marketpulse::storage::{Article, ArticleDraft, Database};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

/// Remove the URL uniqueness index so legacy-style duplicates can be staged.
/// Databases that predate the cleanup tooling are in exactly this state.
async fn allow_url_duplicates(db: &Database) {
    sqlx::query("DROP INDEX IF EXISTS idx_news_articles_url")
        .execute(db.pool())
        .await
        .unwrap();
}

/// Insert a row with an explicit created_at, bypassing the ingest path.
async fn seed_article(
    db: &Database,
    title: &str,
    content: &str,
    url: Option<&str>,
    symbol: &str,
    created_at: i64,
) -> i64 {
    let result = sqlx::query(
        "INSERT INTO news_articles (title, content, url, stock_symbol, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(content)
    .bind(url)
    .bind(symbol)
    .bind(created_at)
    .execute(db.pool())
    .await
    .unwrap();
    result.last_insert_rowid()
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

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_cleanup_keeps_oldest_per_url() {
    let db = test_db().await;
    allow_url_duplicates(&db).await;

    let base = Utc::now().timestamp() - 10_000;
    let oldest = seed_article(&db, "First copy", "Body one.", Some("https://n.test/1"), "SPY", base).await;
    seed_article(&db, "Second copy", "Body two.", Some("https://n.test/1"), "SPY", base + 100).await;
    seed_article(&db, "Third copy", "Body three.", Some("https://n.test/1"), "SPY", base + 200).await;

    let stats = dedup::scan_and_remove(&db, false).await.unwrap();
    assert_eq!(stats.total_articles, 3);
    assert_eq!(stats.url_duplicates, 2);
    assert_eq!(stats.removed_articles, 2);

    let remaining = db.all_articles_ordered().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, oldest);
    assert_eq!(remaining[0].title, "First copy");
}

#[tokio::test]
async fn test_cleanup_keeps_oldest_per_fingerprint() {
    let db = test_db().await;
    let base = Utc::now().timestamp() - 10_000;

    // Same normalized title+content under different URLs.
    let oldest = seed_article(
        &db,
        "Fed Raises Rates!",
        "The central bank moved today.",
        Some("https://a.test/1"),
        "SPY",
        base,
    )
    .await;
    seed_article(
        &db,
        "fed raises rates",
        "The central bank moved, today",
        Some("https://b.test/2"),
        "SPY",
        base + 50,
    )
    .await;

    let stats = dedup::scan_and_remove(&db, false).await.unwrap();
    assert_eq!(stats.url_duplicates, 0);
    assert_eq!(stats.content_duplicates, 1);
    assert_eq!(stats.removed_articles, 1);

    let remaining = db.all_articles_ordered().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, oldest);
}

#[tokio::test]
async fn test_url_classification_takes_precedence() {
    let db = test_db().await;
    allow_url_duplicates(&db).await;
    let base = Utc::now().timestamp() - 10_000;

    // Identical URL and identical content: counted as a URL duplicate only.
    seed_article(&db, "Same story", "Same body.", Some("https://n.test/1"), "SPY", base).await;
    seed_article(&db, "Same story", "Same body.", Some("https://n.test/1"), "SPY", base + 10).await;

    let stats = dedup::analyze(&db).await.unwrap();
    assert_eq!(stats.url_duplicates, 1);
    assert_eq!(stats.content_duplicates, 0);
}

#[tokio::test]
async fn test_dry_run_removes_nothing() {
    let db = test_db().await;
    allow_url_duplicates(&db).await;
    let base = Utc::now().timestamp() - 10_000;

    seed_article(&db, "A", "Body.", Some("https://n.test/1"), "SPY", base).await;
    seed_article(&db, "B", "Body.", Some("https://n.test/1"), "SPY", base + 10).await;

    let stats = dedup::analyze(&db).await.unwrap();
    assert_eq!(stats.url_duplicates, 1);
    assert_eq!(stats.removed_articles, 0);
    assert_eq!(db.article_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let db = test_db().await;
    allow_url_duplicates(&db).await;
    let base = Utc::now().timestamp() - 10_000;

    seed_article(&db, "A", "Body one.", Some("https://n.test/1"), "SPY", base).await;
    seed_article(&db, "B", "Body two.", Some("https://n.test/1"), "SPY", base + 10).await;
    seed_article(&db, "Dup title", "Shared body text.", Some("https://n.test/2"), "SPY", base + 20).await;
    seed_article(&db, "Dup title", "Shared body text.", Some("https://n.test/3"), "SPY", base + 30).await;

    let first = dedup::scan_and_remove(&db, false).await.unwrap();
    assert_eq!(first.removed_articles, 2);

    let second = dedup::scan_and_remove(&db, false).await.unwrap();
    assert_eq!(second.url_duplicates, 0);
    assert_eq!(second.content_duplicates, 0);
    assert_eq!(second.removed_articles, 0);
}

#[tokio::test]
async fn test_cleanup_restores_url_uniqueness() {
    let db = test_db().await;
    allow_url_duplicates(&db).await;
    let base = Utc::now().timestamp() - 10_000;

    seed_article(&db, "A", "Body one.", Some("https://n.test/1"), "SPY", base).await;
    seed_article(&db, "B", "Body two.", Some("https://n.test/1"), "SPY", base + 10).await;

    dedup::scan_and_remove(&db, false).await.unwrap();

    // The index is back: a fresh insert on the surviving URL is rejected.
    let outcome = db
        .insert_article(&draft("C", "Body three.", Some("https://n.test/1"), "SPY"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        marketpulse::storage::InsertOutcome::AlreadyExists
    );
}

// ============================================================================
// Ingest
// ============================================================================

#[tokio::test]
async fn test_same_url_pair_scenario() {
    let db = test_db().await;
    let detector = DuplicateDetector::default();

    let a = draft(
        "Apple announces record earnings",
        "Cupertino reported its strongest quarter on services growth.",
        Some("https://news.test/apple-earnings"),
        "AAPL",
    );
    let outcome = dedup::ingest(&db, &detector, None, &a).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Inserted { .. }));

    // Same link again, re-titled by an aggregator.
    let b = draft(
        "Record earnings at Apple, analysts react",
        "A different summary of the same announcement and its reception.",
        Some("https://news.test/apple-earnings"),
        "AAPL",
    );
    let outcome = dedup::ingest(&db, &detector, None, &b).await.unwrap();
    let IngestOutcome::Duplicate(verdict) = &outcome else {
        panic!("expected duplicate, got {outcome:?}");
    };
    assert_eq!(verdict.kind, Some(DuplicateKind::Url));
    assert_eq!(db.article_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_similar_title_pair_scenario() {
    let db = test_db().await;
    let detector = DuplicateDetector::default();

    let a = draft(
        "Tesla recalls thousands of vehicles",
        "The automaker said a software fault affects braking assistance.",
        Some("https://news.test/tesla-recall-1"),
        "TSLA",
    );
    dedup::ingest(&db, &detector, None, &a).await.unwrap();

    let b = draft(
        "Tesla recalls thousands of vehicle",
        "Wire coverage of the same recall notice, reworded throughout.",
        Some("https://news.test/tesla-recall-2"),
        "TSLA",
    );
    let outcome = dedup::ingest(&db, &detector, None, &b).await.unwrap();
    let IngestOutcome::Duplicate(verdict) = &outcome else {
        panic!("expected duplicate, got {outcome:?}");
    };
    assert_eq!(verdict.kind, Some(DuplicateKind::Similarity));
    assert_eq!(verdict.matched.len(), 1);
    assert_eq!(db.article_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_urlless_pair_caught_by_content_similarity() {
    let db = test_db().await;
    let detector = DuplicateDetector::default();

    let body = "Apple reported quarterly earnings well ahead of consensus, with \
                revenue growth across services and wearables offsetting a modest \
                decline in mac sales, and management guided the next quarter \
                above street expectations citing resilient consumer demand.";
    let c = draft("Apple earnings beat", body, None, "AAPL");
    dedup::ingest(&db, &detector, None, &c).await.unwrap();

    // Different title, near-identical body, no URL on either side.
    let reworded = body.replace("resilient consumer demand", "steady consumer demand");
    let d = draft("Apple earnings beats estimates", &reworded, None, "AAPL");
    let outcome = dedup::ingest(&db, &detector, None, &d).await.unwrap();
    let IngestOutcome::Duplicate(verdict) = &outcome else {
        panic!("expected duplicate, got {outcome:?}");
    };
    assert_eq!(verdict.kind, Some(DuplicateKind::Similarity));
    assert_eq!(db.article_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_distinct_articles_both_ingest() {
    let db = test_db().await;
    let detector = DuplicateDetector::default();

    let a = draft(
        "Fed holds rates steady",
        "Policymakers left the target range unchanged at the June meeting.",
        Some("https://news.test/fed-june"),
        "SPY",
    );
    let b = draft(
        "Oil prices slide on inventory build",
        "Crude fell after stockpiles rose more than analysts expected.",
        Some("https://news.test/oil-slide"),
        "SPY",
    );
    assert!(matches!(
        dedup::ingest(&db, &detector, None, &a).await.unwrap(),
        IngestOutcome::Inserted { .. }
    ));
    assert!(matches!(
        dedup::ingest(&db, &detector, None, &b).await.unwrap(),
        IngestOutcome::Inserted { .. }
    ));
    assert_eq!(db.article_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_ingest_applies_sentiment_scorer() {
    use marketpulse::sentiment::{SentimentLabel, SentimentScore, SentimentScorer};

    struct FixedScorer;
    impl SentimentScorer for FixedScorer {
        fn score(&self, _text: &str) -> SentimentScore {
            SentimentScore {
                value: 0.6,
                label: SentimentLabel::Positive,
            }
        }
    }

    let db = test_db().await;
    let detector = DuplicateDetector::default();
    let outcome = dedup::ingest(
        &db,
        &detector,
        Some(&FixedScorer),
        &draft(
            "Chipmaker guides above expectations",
            "Management raised the full-year outlook on data center demand.",
            Some("https://news.test/chips"),
            "NVDA",
        ),
    )
    .await
    .unwrap();
    let IngestOutcome::Inserted { id } = &outcome else {
        panic!("expected insert, got {outcome:?}");
    };
    let id = *id;

    let stored: Article = sqlx::query_as("SELECT * FROM news_articles WHERE id = ?")
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(stored.sentiment_score, Some(0.6));
    assert_eq!(stored.sentiment_label.as_deref(), Some("positive"));
}
