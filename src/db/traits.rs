// Database trait: async interface for every store operation the pipeline uses.
//
// The only implementor is SqliteDatabase (wraps rusqlite behind a Mutex).
// All methods are async so stages can share one `Arc<dyn Database>` across
// tokio tasks without caring how the backend serializes access.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{CleanedPost, Label, LabelledPost, LabelledView, RawPost, RawSnapshot, TableCounts};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Raw store ---

    /// Insert a post iff no post with the same id exists.
    /// Returns true when inserted, false when the id was already stored.
    async fn upsert_raw_post(&self, post: &RawPost) -> Result<bool>;

    /// Read a consistent snapshot of the whole raw table.
    async fn raw_snapshot(&self) -> Result<RawSnapshot>;

    // --- Cleaned store ---

    /// Atomically replace the cleaned table's contents.
    async fn replace_cleaned(&self, posts: &[CleanedPost]) -> Result<()>;

    /// Read every cleaned post.
    async fn cleaned_posts(&self) -> Result<Vec<CleanedPost>>;

    // --- Label store ---

    /// Write a label, overwriting any previous label for the id.
    async fn upsert_label(&self, id: &str, title: &str, label: Label) -> Result<()>;

    /// Read every stored label.
    async fn labelled_posts(&self) -> Result<Vec<LabelledPost>>;

    /// Labels joined with raw fields, newest first.
    async fn labelled_view(&self, limit: Option<u32>) -> Result<Vec<LabelledView>>;

    // --- Bookkeeping ---

    async fn table_counts(&self) -> Result<TableCounts>;

    /// Get a run state value by key (e.g., "last_label_at").
    async fn get_run_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a run state value (upsert).
    async fn set_run_state(&self, key: &str, value: &str) -> Result<()>;
}
