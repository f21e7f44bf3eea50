// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for the whole statement is what makes the raw store's
// INSERT OR IGNORE an atomic check-and-write for concurrent connectors.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{CleanedPost, Label, LabelledPost, LabelledView, RawPost, RawSnapshot, TableCounts};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn upsert_raw_post(&self, post: &RawPost) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::insert_raw_post(&conn, post)
    }

    async fn raw_snapshot(&self) -> Result<RawSnapshot> {
        let conn = self.conn.lock().await;
        super::queries::raw_snapshot(&conn)
    }

    async fn replace_cleaned(&self, posts: &[CleanedPost]) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::replace_cleaned(&conn, posts)
    }

    async fn cleaned_posts(&self) -> Result<Vec<CleanedPost>> {
        let conn = self.conn.lock().await;
        super::queries::cleaned_posts(&conn)
    }

    async fn upsert_label(&self, id: &str, title: &str, label: Label) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_label(&conn, id, title, label)
    }

    async fn labelled_posts(&self) -> Result<Vec<LabelledPost>> {
        let conn = self.conn.lock().await;
        super::queries::labelled_posts(&conn)
    }

    async fn labelled_view(&self, limit: Option<u32>) -> Result<Vec<LabelledView>> {
        let conn = self.conn.lock().await;
        super::queries::labelled_view(&conn, limit)
    }

    async fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.conn.lock().await;
        super::queries::table_counts(&conn)
    }

    async fn get_run_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_run_state(&conn, key)
    }

    async fn set_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_run_state(&conn, key, value)
    }
}
