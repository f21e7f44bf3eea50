// Cleaning stage: raw snapshot in, cleaned table out.
//
// Reads the whole raw table, validates and normalizes titles, and replaces
// the cleaned table in one transaction. If the raw schema has no title
// column the stage fails before touching the cleaned table.

pub mod cleaner;

use tracing::{info, warn};

use crate::db::Database;
use crate::error::StageError;

pub use cleaner::{clean, QualityReport};

pub async fn run(db: &dyn Database) -> Result<QualityReport, StageError> {
    let snapshot = db.raw_snapshot().await?;
    info!(rows = snapshot.posts.len(), "Loaded raw snapshot");

    let (cleaned, report) = match clean(&snapshot) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Cleaning aborted, cleaned table left untouched");
            return Err(e);
        }
    };

    for expectation in &report.expectations {
        if expectation.passed {
            info!(check = expectation.name, "Quality check passed");
        } else {
            warn!(check = expectation.name, "Quality check failed");
        }
    }

    db.replace_cleaned(&cleaned).await?;

    info!(
        loaded = report.rows_loaded,
        dropped_null_title = report.rows_dropped_null_title,
        written = report.rows_written,
        special_char_titles = report.special_char_titles,
        special_char_fraction = report.special_char_fraction,
        "Cleaning complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CleanedPost, Platform, RawPost};
    use chrono::Utc;

    fn raw(id: &str, title: Option<&str>) -> RawPost {
        RawPost {
            id: id.to_string(),
            title: title.map(str::to_string),
            body: None,
            url: format!("https://example.com/{id}"),
            score: 1,
            comment_count: 0,
            community: "news".to_string(),
            captured_at: Utc::now(),
            platform: Platform::Reddit,
        }
    }

    #[tokio::test]
    async fn test_run_replaces_cleaned_table() {
        let db = crate::db::in_memory().unwrap();
        db.replace_cleaned(&[CleanedPost {
            id: "stale".into(),
            cleaned_title: "left over".into(),
        }])
        .await
        .unwrap();

        db.upsert_raw_post(&raw("a", Some("Hello! @World#2024"))).await.unwrap();
        db.upsert_raw_post(&raw("b", None)).await.unwrap();

        let report = run(db.as_ref()).await.unwrap();
        assert_eq!(report.rows_written, 1);

        let cleaned = db.cleaned_posts().await.unwrap();
        assert_eq!(
            cleaned,
            vec![CleanedPost {
                id: "a".into(),
                cleaned_title: "Hello World2024".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_run_twice_gives_same_table() {
        let db = crate::db::in_memory().unwrap();
        for (id, title) in [("x", "one!"), ("y", "two?"), ("z", "three")] {
            db.upsert_raw_post(&raw(id, Some(title))).await.unwrap();
        }

        run(db.as_ref()).await.unwrap();
        let first = db.cleaned_posts().await.unwrap();
        run(db.as_ref()).await.unwrap();
        let second = db.cleaned_posts().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
