// End-to-end pipeline tests with stub connectors and a stub completion API.
//
// These run the real scrape → clean → label plan against a file-backed
// SQLite store in a temp dir, so everything below the network boundary is
// exercised as in production.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tempfile::TempDir;

use hatewatch::classifier::rate_limiter::RateLimiter;
use hatewatch::classifier::CompletionClient;
use hatewatch::db::models::{Label, Platform, RawPost};
use hatewatch::db::{self, Database};
use hatewatch::error::{SourceError, StageError};
use hatewatch::pipeline::{self, Labeling, RetryPolicy, Stage};
use hatewatch::report::Summary;
use hatewatch::sources::{Connector, PostStream};

// ============================================================
// Stubs
// ============================================================

struct StubConnector {
    name: &'static str,
    platform: Platform,
    posts: Vec<RawPost>,
}

impl Connector for StubConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn posts(&self) -> PostStream<'_> {
        let items: Vec<Result<RawPost, SourceError>> = self.posts.iter().cloned().map(Ok).collect();
        futures::stream::iter(items).boxed()
    }
}

/// Labels anything mentioning "idiot" as cyberhate, everything else neutral.
struct StubModerator;

#[async_trait]
impl CompletionClient for StubModerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let comment = prompt.rsplit("Comment: ").next().unwrap_or_default();
        Ok(if comment.contains("idiot") { "1" } else { "0" }.to_string())
    }
}

fn post(id: &str, title: Option<&str>, community: &str, platform: Platform) -> RawPost {
    RawPost {
        id: id.to_string(),
        title: title.map(str::to_string),
        body: None,
        url: format!("https://example.com/{id}"),
        score: 10,
        comment_count: 3,
        community: community.to_string(),
        captured_at: Utc.with_ymd_and_hms(2024, 5, 13, 10, 0, 0).unwrap(),
        platform,
    }
}

fn setup() -> (Arc<dyn Database>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("hatewatch.db");
    let db = db::initialize_sqlite(path.to_str().unwrap()).expect("Failed to create database");
    (db, dir)
}

fn labeling() -> Labeling {
    Labeling {
        client: Arc::new(StubModerator),
        limiter: RateLimiter::new(Duration::ZERO),
        concurrency: 2,
    }
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        delay: Duration::ZERO,
    }
}

// ============================================================
// Full plan
// ============================================================

#[tokio::test]
async fn full_run_labels_every_titled_post() {
    let (db, _dir) = setup();
    let connectors: Vec<Arc<dyn Connector>> = vec![Arc::new(StubConnector {
        name: "reddit",
        platform: Platform::Reddit,
        posts: vec![
            post("r1", Some("Just shut up already, idiot!"), "news", Platform::Reddit),
            post("r2", Some("Lovely park opening today"), "news", Platform::Reddit),
            post("r3", None, "funny", Platform::Reddit),
        ],
    })];

    let summary = pipeline::run_all(&db, &connectors, &labeling(), &quick_policy())
        .await
        .unwrap();

    assert_eq!(summary.connectors[0].inserted, 3);
    assert_eq!(summary.quality.rows_written, 2);
    assert_eq!(summary.quality.rows_dropped_null_title, 1);
    assert_eq!(summary.labels.cyberhate, 1);
    assert_eq!(summary.labels.neutral, 1);

    let mut labels = db.labelled_posts().await.unwrap();
    labels.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0].id, "r1");
    assert_eq!(labels[0].title, "Just shut up already idiot");
    assert_eq!(labels[0].label, Label::Cyberhate);
    assert_eq!(labels[1].label, Label::Neutral);

    for stage in Stage::ALL {
        assert!(
            db.get_run_state(&stage.state_key()).await.unwrap().is_some(),
            "{stage} should have a completion time"
        );
    }
}

#[tokio::test]
async fn overlapping_sources_store_the_union_and_first_writer_wins() {
    let (db, _dir) = setup();
    let connectors: Vec<Arc<dyn Connector>> = vec![
        Arc::new(StubConnector {
            name: "one",
            platform: Platform::Reddit,
            posts: vec![
                post("a", Some("from one"), "news", Platform::Reddit),
                post("b", Some("from one"), "news", Platform::Reddit),
            ],
        }),
        Arc::new(StubConnector {
            name: "two",
            platform: Platform::Reddit,
            posts: vec![
                post("b", Some("from two"), "news", Platform::Reddit),
                post("c", Some("from two"), "news", Platform::Reddit),
            ],
        }),
    ];

    pipeline::scrape_stage(&db, &connectors, &quick_policy()).await.unwrap();
    // A second scrape changes nothing
    let rerun = pipeline::scrape_stage(&db, &connectors, &quick_policy()).await.unwrap();

    let snapshot = db.raw_snapshot().await.unwrap();
    let ids: Vec<&str> = snapshot.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(rerun.iter().all(|s| s.inserted == 0));

    let b = snapshot.posts.iter().find(|p| p.id == "b").unwrap();
    assert!(
        b.title.as_deref() == Some("from one") || b.title.as_deref() == Some("from two"),
        "stored row must be one writer's version, unmodified"
    );
}

#[tokio::test]
async fn relabeling_overwrites_and_leaves_raw_untouched() {
    let (db, _dir) = setup();
    let connectors: Vec<Arc<dyn Connector>> = vec![Arc::new(StubConnector {
        name: "reddit",
        platform: Platform::Reddit,
        posts: vec![post("r1", Some("you idiot"), "news", Platform::Reddit)],
    })];

    pipeline::run_all(&db, &connectors, &labeling(), &quick_policy()).await.unwrap();
    let before = db.raw_snapshot().await.unwrap();
    pipeline::run_all(&db, &connectors, &labeling(), &quick_policy()).await.unwrap();
    let after = db.raw_snapshot().await.unwrap();

    assert_eq!(before.posts, after.posts);
    assert_eq!(db.labelled_posts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn report_view_joins_labels_with_raw_fields() {
    let (db, _dir) = setup();
    let connectors: Vec<Arc<dyn Connector>> = vec![
        Arc::new(StubConnector {
            name: "reddit",
            platform: Platform::Reddit,
            posts: vec![
                post("r1", Some("idiot"), "news", Platform::Reddit),
                post("r2", Some("nice"), "news", Platform::Reddit),
            ],
        }),
        Arc::new(StubConnector {
            name: "quora",
            platform: Platform::Quora,
            posts: vec![post("qa_What-is-hate_1", Some("an answer"), "hate", Platform::Quora)],
        }),
    ];

    pipeline::run_all(&db, &connectors, &labeling(), &quick_policy()).await.unwrap();

    let rows = db.labelled_view(None).await.unwrap();
    assert_eq!(rows.len(), 3);
    let quora = rows.iter().find(|r| r.platform == "quora").unwrap();
    assert_eq!(quora.community, "hate");
    assert_eq!(quora.comments, 3);
    assert_eq!(quora.timestamp, "2024-05-13 10:00:00");

    let summary = Summary::from_rows(&rows);
    assert_eq!(summary.total_posts, 3);
    assert_eq!(summary.most_active_community.as_deref(), Some("news"));
    assert_eq!(summary.top_platform.as_deref(), Some("reddit"));
}

// ============================================================
// Failure paths
// ============================================================

#[tokio::test]
async fn missing_title_column_aborts_cleaning_without_touching_cleaned() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hatewatch.db");
    let path = path.to_str().unwrap();
    let db = db::initialize_sqlite(path).unwrap();

    let connectors: Vec<Arc<dyn Connector>> = vec![Arc::new(StubConnector {
        name: "reddit",
        platform: Platform::Reddit,
        posts: vec![post("r1", Some("kept"), "news", Platform::Reddit)],
    })];
    pipeline::scrape_stage(&db, &connectors, &quick_policy()).await.unwrap();
    pipeline::clean_stage(&db, &quick_policy()).await.unwrap();
    assert_eq!(db.cleaned_posts().await.unwrap().len(), 1);
    drop(db);

    // Someone drops the title column out from under us
    {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute("ALTER TABLE raw DROP COLUMN title", []).unwrap();
    }

    let db = db::open_sqlite(path).unwrap();
    let err = pipeline::clean_stage(&db, &quick_policy()).await.unwrap_err();

    assert!(matches!(err, StageError::Configuration(_)));
    assert_eq!(db.cleaned_posts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn label_stage_with_empty_cleaned_table_is_a_no_op() {
    let (db, _dir) = setup();
    let stats = pipeline::label_stage(&db, &labeling(), &quick_policy()).await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(db.table_counts().await.unwrap().labelled, 0);
}
