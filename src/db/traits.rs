// Database trait: backend-agnostic async interface.
//
// Implementors: SqliteDatabase (rusqlite behind a Mutex) and PgDatabase
// (sqlx pool). Async so both fit behind `Arc<dyn Database>`.

use anyhow::Result;
use async_trait::async_trait;

use super::models::TopTweet;

#[async_trait]
pub trait Database: Send + Sync {
    /// Count the user-created tables.
    async fn table_count(&self) -> Result<i64>;

    /// Replace the whole top_tweets table with `rows`, atomically.
    async fn replace_top_tweets(&self, rows: &[TopTweet]) -> Result<()>;

    /// Current top_tweets rows, highest score first.
    async fn get_top_tweets(&self) -> Result<Vec<TopTweet>>;
}
