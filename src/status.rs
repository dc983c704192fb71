// Status display: storage backend, table count, and the last top_tweets refresh.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;

/// Where the data lives, for display.
pub enum StorageLocation<'a> {
    SqliteFile(&'a str),
    Postgres,
}

/// Print database status. Reports "not initialized" for a missing SQLite
/// file instead of failing.
pub async fn show(db: Option<&Arc<dyn Database>>, location: StorageLocation<'_>) -> Result<()> {
    match location {
        StorageLocation::SqliteFile(path) => {
            if !Path::new(path).exists() {
                println!("Database: not initialized");
                println!("\nRun `snowbot init` to set up the database.");
                return Ok(());
            }
            let file_size = std::fs::metadata(path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            println!("Database: {} ({})", path, file_size);
        }
        StorageLocation::Postgres => println!("Database: PostgreSQL"),
    }

    let Some(db) = db else {
        return Ok(());
    };

    println!("Tables: {}", db.table_count().await?);

    let rows = db.get_top_tweets().await?;
    match rows.first() {
        Some(top) => {
            println!(
                "Top tweets: {} rows (updated {} UTC)",
                rows.len(),
                top.updated_at
            );
            println!("  Highest score: {} ({})", top.score, top.url());
        }
        None => {
            println!("Top tweets: none yet");
            println!("  Run `snowbot top` to collect them");
        }
    }

    Ok(())
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
