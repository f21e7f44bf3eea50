// Database queries: reads and writes for the raw, cleaned and label tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the pipeline clean Rust
// interfaces. Loosely typed SQLite values are turned into fixed-field
// records here, at the store boundary.

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::models::{
    format_timestamp, parse_timestamp, CleanedPost, Label, LabelledPost, LabelledView, Platform,
    RawPost, RawSnapshot, TableCounts,
};
use super::schema::table_columns;

// --- Raw store ---

/// Rows written before the platform column existed are Reddit. An
/// unrecognized value is logged and read back as Reddit too.
fn stored_platform(id: &str, raw: Option<&str>) -> Platform {
    let Some(raw) = raw else {
        return Platform::Reddit;
    };
    Platform::parse(raw).unwrap_or_else(|| {
        warn!(id = %id, platform = %raw, "Unrecognized platform in raw table, reading as reddit");
        Platform::Reddit
    })
}

/// Insert a raw post if no row with its id exists yet.
///
/// Returns true when the row was inserted, false when the id was already
/// present (the existing row is left untouched, first writer wins).
pub fn insert_raw_post(conn: &Connection, post: &RawPost) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO raw
            (id, title, text, url, score, comments, community, timestamp, platform)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            post.id,
            post.title,
            post.body,
            post.url,
            post.score,
            post.comment_count,
            post.community,
            format_timestamp(&post.captured_at),
            post.platform.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// Read the whole raw table, ordered by id.
///
/// If the schema has no `title` column the snapshot is still returned, with
/// `has_title_column = false` and every title `None`, so the cleaning stage
/// can decide how to fail.
pub fn raw_snapshot(conn: &Connection) -> Result<RawSnapshot> {
    let columns = table_columns(conn, "raw")?;
    let has_title_column = columns.iter().any(|c| c == "title");
    let title_expr = if has_title_column { "title" } else { "NULL" };

    let sql = format!(
        "SELECT id, {title_expr}, text, url, score, comments, community, timestamp, platform
         FROM raw
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let title: Value = row.get(1)?;
        let timestamp: Option<String> = row.get(7)?;
        let platform: Option<String> = row.get(8)?;
        let id: String = row.get(0)?;
        let platform = stored_platform(&id, platform.as_deref());
        Ok(RawPost {
            id,
            title: coerce_text(title),
            body: row.get(2)?,
            url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            score: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            comment_count: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            community: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            captured_at: timestamp.as_deref().map(parse_timestamp).unwrap_or_default(),
            platform,
        })
    })?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }

    Ok(RawSnapshot {
        has_title_column,
        posts,
    })
}

/// Coerce a dynamically typed SQLite value to text. NULL stays `None`.
fn coerce_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

// --- Cleaned store ---

/// Replace the entire cleaned table with `posts` in one transaction.
pub fn replace_cleaned(conn: &Connection, posts: &[CleanedPost]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM cleaned", [])?;
    {
        let mut stmt = tx.prepare("INSERT INTO cleaned (id, title) VALUES (?1, ?2)")?;
        for post in posts {
            stmt.execute(params![post.id, post.cleaned_title])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Read every cleaned post, ordered by id.
pub fn cleaned_posts(conn: &Connection) -> Result<Vec<CleanedPost>> {
    let mut stmt = conn.prepare("SELECT id, title FROM cleaned ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(CleanedPost {
            id: row.get(0)?,
            cleaned_title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        })
    })?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

// --- Label store ---

/// Write a label, replacing any previous judgment for the same id.
pub fn upsert_label(conn: &Connection, id: &str, title: &str, label: Label) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO labelled (id, title, label) VALUES (?1, ?2, ?3)",
        params![id, title, label.as_i64()],
    )?;
    Ok(())
}

/// Read every labelled post with a non-null label, ordered by id.
pub fn labelled_posts(conn: &Connection) -> Result<Vec<LabelledPost>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, label FROM labelled WHERE label IS NOT NULL ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let label: i64 = row.get(2)?;
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            label,
        ))
    })?;

    let mut posts = Vec::new();
    for row in rows {
        let (id, title, label) = row?;
        // Values outside {0, 1} can only come from manual edits; skip them
        if let Some(label) = Label::from_i64(label) {
            posts.push(LabelledPost { id, title, label });
        }
    }
    Ok(posts)
}

/// The presentation view for the analytics layer: labels joined with the
/// raw fields they describe, newest first.
pub fn labelled_view(conn: &Connection, limit: Option<u32>) -> Result<Vec<LabelledView>> {
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT r.title, r.community, r.score, r.comments, r.timestamp, r.platform, l.label
         FROM labelled l
         JOIN raw r ON r.id = l.id
         ORDER BY r.timestamp DESC, l.id
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        let title: Value = row.get(0)?;
        let label: Option<i64> = row.get(6)?;
        Ok(LabelledView {
            topic: coerce_text(title),
            community: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            score: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            comments: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            timestamp: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            platform: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            label: label.and_then(Label::from_i64),
        })
    })?;

    let mut view = Vec::new();
    for row in rows {
        view.push(row?);
    }
    Ok(view)
}

/// Count rows across the pipeline tables.
pub fn table_counts(conn: &Connection) -> Result<TableCounts> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(TableCounts {
        raw: count("SELECT COUNT(*) FROM raw")?,
        raw_null_title: count("SELECT COUNT(*) FROM raw WHERE title IS NULL")?,
        cleaned: count("SELECT COUNT(*) FROM cleaned")?,
        labelled: count("SELECT COUNT(*) FROM labelled WHERE label IS NOT NULL")?,
        cyberhate: count("SELECT COUNT(*) FROM labelled WHERE label = 1")?,
    })
}

// --- Run state ---

/// Get a run state value by key (e.g., "last_clean_at").
pub fn get_run_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM run_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a run state value (upsert).
pub fn set_run_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use chrono::{TimeZone, Utc};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn post(id: &str, title: Option<&str>) -> RawPost {
        RawPost {
            id: id.to_string(),
            title: title.map(str::to_string),
            body: None,
            url: format!("https://example.com/{id}"),
            score: 10,
            comment_count: 2,
            community: "news".to_string(),
            captured_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            platform: Platform::Reddit,
        }
    }

    #[test]
    fn test_insert_raw_post_first_writer_wins() {
        let conn = test_conn();
        assert!(insert_raw_post(&conn, &post("abc", Some("first"))).unwrap());

        let mut second = post("abc", Some("second"));
        second.score = 999;
        assert!(!insert_raw_post(&conn, &second).unwrap());

        let snapshot = raw_snapshot(&conn).unwrap();
        assert_eq!(snapshot.posts.len(), 1);
        assert_eq!(snapshot.posts[0], post("abc", Some("first")));
    }

    #[test]
    fn test_unrecognized_platform_reads_as_reddit() {
        let conn = test_conn();
        let mut quora = post("qa_What-is-x_1", Some("answer"));
        quora.platform = Platform::Quora;
        insert_raw_post(&conn, &quora).unwrap();
        insert_raw_post(&conn, &post("odd", Some("title"))).unwrap();
        conn.execute("UPDATE raw SET platform = 'myspace' WHERE id = 'odd'", [])
            .unwrap();

        let snapshot = raw_snapshot(&conn).unwrap();
        let odd = snapshot.posts.iter().find(|p| p.id == "odd").unwrap();
        assert_eq!(odd.platform, Platform::Reddit);
        let kept = snapshot.posts.iter().find(|p| p.id == "qa_What-is-x_1").unwrap();
        assert_eq!(kept.platform, Platform::Quora);

        assert_eq!(stored_platform("legacy", None), Platform::Reddit);
        assert_eq!(stored_platform("tw_1", Some("twitter")), Platform::Twitter);
    }

    #[test]
    fn test_raw_snapshot_keeps_null_titles() {
        let conn = test_conn();
        insert_raw_post(&conn, &post("a", Some("hello"))).unwrap();
        insert_raw_post(&conn, &post("b", None)).unwrap();

        let snapshot = raw_snapshot(&conn).unwrap();
        assert!(snapshot.has_title_column);
        assert_eq!(snapshot.posts.len(), 2);
        assert_eq!(snapshot.posts[1].title, None);
    }

    #[test]
    fn test_raw_snapshot_coerces_non_text_titles() {
        let conn = test_conn();
        conn.execute("INSERT INTO raw (id, title) VALUES ('n', 2024)", [])
            .unwrap();
        conn.execute("INSERT INTO raw (id, title) VALUES ('r', 1.5)", [])
            .unwrap();

        let snapshot = raw_snapshot(&conn).unwrap();
        assert_eq!(snapshot.posts[0].title.as_deref(), Some("2024"));
        assert_eq!(snapshot.posts[1].title.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_raw_snapshot_without_title_column() {
        let conn = test_conn();
        insert_raw_post(&conn, &post("a", Some("hello"))).unwrap();
        conn.execute_batch("ALTER TABLE raw DROP COLUMN title").unwrap();

        let snapshot = raw_snapshot(&conn).unwrap();
        assert!(!snapshot.has_title_column);
        assert_eq!(snapshot.posts.len(), 1);
        assert!(snapshot.posts[0].title.is_none());
    }

    #[test]
    fn test_replace_cleaned_replaces_everything() {
        let conn = test_conn();
        let first = vec![
            CleanedPost { id: "a".into(), cleaned_title: "one".into() },
            CleanedPost { id: "b".into(), cleaned_title: "two".into() },
        ];
        replace_cleaned(&conn, &first).unwrap();

        let second = vec![CleanedPost { id: "c".into(), cleaned_title: "three".into() }];
        replace_cleaned(&conn, &second).unwrap();

        assert_eq!(cleaned_posts(&conn).unwrap(), second);
    }

    #[test]
    fn test_upsert_label_overwrites() {
        let conn = test_conn();
        upsert_label(&conn, "a", "title", Label::Neutral).unwrap();
        upsert_label(&conn, "a", "title", Label::Cyberhate).unwrap();

        let labels = labelled_posts(&conn).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, Label::Cyberhate);
    }

    #[test]
    fn test_labelled_view_joins_raw_fields() {
        let conn = test_conn();
        let mut raw = post("a", Some("Original Title!"));
        raw.community = "worldnews".into();
        insert_raw_post(&conn, &raw).unwrap();
        upsert_label(&conn, "a", "Original Title", Label::Cyberhate).unwrap();
        // A label without a raw row is not part of the view
        upsert_label(&conn, "ghost", "nothing", Label::Neutral).unwrap();

        let view = labelled_view(&conn, None).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].topic.as_deref(), Some("Original Title!"));
        assert_eq!(view[0].community, "worldnews");
        assert_eq!(view[0].platform, "reddit");
        assert_eq!(view[0].timestamp, "2025-05-01 12:00:00");
        assert_eq!(view[0].label, Some(Label::Cyberhate));
    }

    #[test]
    fn test_labelled_view_limit() {
        let conn = test_conn();
        for id in ["a", "b", "c"] {
            insert_raw_post(&conn, &post(id, Some(id))).unwrap();
            upsert_label(&conn, id, id, Label::Neutral).unwrap();
        }
        assert_eq!(labelled_view(&conn, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_table_counts() {
        let conn = test_conn();
        insert_raw_post(&conn, &post("a", Some("x"))).unwrap();
        insert_raw_post(&conn, &post("b", None)).unwrap();
        replace_cleaned(&conn, &[CleanedPost { id: "a".into(), cleaned_title: "x".into() }])
            .unwrap();
        upsert_label(&conn, "a", "x", Label::Cyberhate).unwrap();

        let counts = table_counts(&conn).unwrap();
        assert_eq!(
            counts,
            TableCounts { raw: 2, raw_null_title: 1, cleaned: 1, labelled: 1, cyberhate: 1 }
        );
    }

    #[test]
    fn test_run_state_roundtrip() {
        let conn = test_conn();
        assert_eq!(get_run_state(&conn, "last_clean_at").unwrap(), None);
        set_run_state(&conn, "last_clean_at", "2025-05-01 12:00:00").unwrap();
        set_run_state(&conn, "last_clean_at", "2025-05-02 12:00:00").unwrap();
        assert_eq!(
            get_run_state(&conn, "last_clean_at").unwrap().as_deref(),
            Some("2025-05-02 12:00:00")
        );
    }
}
