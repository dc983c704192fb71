// SQLite queries for the top_tweets table.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::TopTweet;

/// Delete every row and insert `rows`, in one transaction.
///
/// If any insert fails the transaction is dropped without commit and the
/// previous contents survive.
pub fn replace_top_tweets(conn: &mut Connection, rows: &[TopTweet]) -> Result<()> {
    let tx = conn
        .transaction()
        .context("Failed to start top_tweets transaction")?;

    tx.execute("DELETE FROM top_tweets", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO top_tweets (id, score, likes, retweets, replies, quotes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.id,
                row.score,
                row.likes,
                row.retweets,
                row.replies,
                row.quotes,
                row.updated_at,
            ])
            .with_context(|| format!("Failed to insert top tweet {}", row.id))?;
        }
    }

    tx.commit().context("Failed to commit top_tweets")?;
    Ok(())
}

/// All rows, highest score first.
pub fn get_top_tweets(conn: &Connection) -> Result<Vec<TopTweet>> {
    let mut stmt = conn.prepare(
        "SELECT id, score, likes, retweets, replies, quotes, updated_at
         FROM top_tweets
         ORDER BY score DESC, rowid ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(TopTweet {
                id: row.get(0)?,
                score: row.get(1)?,
                likes: row.get(2)?,
                retweets: row.get(3)?,
                replies: row.get(4)?,
                quotes: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
