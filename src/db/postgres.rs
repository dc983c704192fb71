// PgDatabase: PostgreSQL backend for the Database trait.
//
// Runtime-bound queries through a sqlx pool, so no DATABASE_URL is needed at
// compile time. Differences from SQLite: BIGINT counters, TIMESTAMPTZ for
// updated_at, and $N placeholders.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::Postgres;

use super::models::TopTweet;
use super::traits::Database;

pub type PgPool = Pool<Postgres>;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply migrations under a session-level advisory lock.
    ///
    /// The lock and unlock must run on the same connection, so one is held
    /// for the whole sequence. The unlock runs even when a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "SNOWBOT\0" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x534E4F57424F5400_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [(
                1,
                include_str!("../../migrations/postgres/0001_initial.sql"),
            )];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .with_context(|| format!("Failed to check whether migration v{version} is applied"))?;

                if !applied {
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit()
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        migration_result?;
        unlock_result?;

        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn replace_top_tweets(&self, rows: &[TopTweet]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start top_tweets transaction")?;

        sqlx_core::query::query("DELETE FROM top_tweets")
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx_core::query::query(
                "INSERT INTO top_tweets (id, score, likes, retweets, replies, quotes, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7::timestamp AT TIME ZONE 'UTC')",
            )
            .bind(&row.id)
            .bind(row.score)
            .bind(row.likes)
            .bind(row.retweets)
            .bind(row.replies)
            .bind(row.quotes)
            .bind(&row.updated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert top tweet {}", row.id))?;
        }

        // Dropping an uncommitted transaction rolls it back.
        tx.commit().await.context("Failed to commit top_tweets")?;
        Ok(())
    }

    async fn get_top_tweets(&self) -> Result<Vec<TopTweet>> {
        let rows = sqlx_core::query::query(
            "SELECT id, score, likes, retweets, replies, quotes,
                    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS') AS updated_at
             FROM top_tweets
             ORDER BY score DESC, row_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| TopTweet {
                id: r.get(0),
                score: r.get(1),
                likes: r.get(2),
                retweets: r.get(3),
                replies: r.get(4),
                quotes: r.get(5),
                updated_at: r.get(6),
            })
            .collect())
    }
}
