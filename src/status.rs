// System status display: DB stats, table counts, last completion per stage.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::pipeline::Stage;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_display_path: &str) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let counts = db.table_counts().await?;
    println!(
        "Raw posts: {} ({} without a title)",
        counts.raw, counts.raw_null_title
    );
    println!("Cleaned posts: {}", counts.cleaned);
    println!(
        "Labelled posts: {} ({} cyberhate, {} neutral)",
        counts.labelled,
        counts.cyberhate,
        counts.labelled - counts.cyberhate
    );
    if counts.cleaned > counts.labelled {
        println!(
            "  {} cleaned posts have no label yet",
            counts.cleaned - counts.labelled
        );
    }

    for stage in Stage::ALL {
        match db.get_run_state(&stage.state_key()).await? {
            Some(at) => println!("Last {}: {} UTC", stage, at),
            None => println!("Last {}: never", stage),
        }
    }

    if counts.raw == 0 {
        println!("\nRun `hatewatch scrape` (or `hatewatch run`) to collect posts.");
    }

    Ok(())
}

/// True when there's no database file to report on.
pub fn is_uninitialized(db_path: &str) -> bool {
    !Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
