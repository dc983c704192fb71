// SqliteDatabase: rusqlite backend for the Database trait.
//
// Connection is !Sync, so it sits behind a tokio Mutex. Each method locks,
// runs the synchronous query from queries.rs, and returns; the guard never
// lives across an await.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::TopTweet;
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened connection.
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

    async fn replace_top_tweets(&self, rows: &[TopTweet]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        super::queries::replace_top_tweets(&mut conn, rows)
    }

    async fn get_top_tweets(&self) -> Result<Vec<TopTweet>> {
        let conn = self.conn.lock().await;
        super::queries::get_top_tweets(&conn)
    }
}
