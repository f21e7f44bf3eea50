// Database schema: table creation and migrations.
//
// A `schema_version` table tracks which migrations have run, and each
// migration is a function that executes SQL statements.
//
// Foreign keys are declared (cleaned → raw, labelled → cleaned) but
// `PRAGMA foreign_keys` stays at SQLite's default of OFF: the cleaned table
// is rebuilt with a DELETE on every run, and enforcing the cascade would
// wipe every stored label along with it.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Append-only capture log. First write for an id wins.
        CREATE TABLE IF NOT EXISTS raw (
            id TEXT PRIMARY KEY,
            title TEXT,
            text TEXT,
            url TEXT,
            score INTEGER,
            comments INTEGER,
            community TEXT,
            timestamp TEXT
        );

        -- Rebuilt from scratch by every cleaning run
        CREATE TABLE IF NOT EXISTS cleaned (
            id TEXT PRIMARY KEY,
            title TEXT,
            FOREIGN KEY (id) REFERENCES raw(id) ON DELETE CASCADE
        );

        -- Overwritten per id by every labeling run
        CREATE TABLE IF NOT EXISTS labelled (
            id TEXT PRIMARY KEY,
            title TEXT,
            label INTEGER,                     -- 1 = cyberhate, 0 = not cyberhate
            FOREIGN KEY (id) REFERENCES cleaned(id) ON DELETE CASCADE
        );

        -- Stage bookkeeping: last completion time per stage
        CREATE TABLE IF NOT EXISTS run_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: tag each raw row with the platform it came from.
    // Rows captured before multi-source collection are all Reddit posts.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "ALTER TABLE raw ADD COLUMN platform TEXT NOT NULL DEFAULT 'reddit';
             CREATE INDEX IF NOT EXISTS idx_raw_platform ON raw(platform);",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// List the column names of a table, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
