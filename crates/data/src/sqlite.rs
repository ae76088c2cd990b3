use crate::repository::BotRepository;
use anyhow::{Context, Result};
use arb_bot_core::config::DatabaseConfig;
use arb_bot_core::{BotRecord, BotStatus};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// `SQLite`-backed bot repository.
///
/// Records are stored as a JSON blob next to an indexed `status` column so
/// `find_by_status` stays a plain query while the record shape can evolve.
#[derive(Clone)]
pub struct SqliteBotRepository {
    pool: SqlitePool,
}

impl SqliteBotRepository {
    /// Opens a connection pool per the database config and ensures the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or schema creation fails.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .context("Failed to open bot database")?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Creates an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bots (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                record_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_bots_status ON bots(status)")
            .execute(pool)
            .await?;

        Ok(())
    }

    fn decode(record_json: &str) -> Result<BotRecord> {
        serde_json::from_str(record_json).context("Corrupt bot record in database")
    }

    async fn upsert(&self, record: &BotRecord) -> Result<()> {
        let record_json = serde_json::to_string(record)?;

        sqlx::query(
            r"
            INSERT INTO bots (id, status, record_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&record.id)
        .bind(record.status.to_string())
        .bind(record_json)
        .bind(record.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BotRepository for SqliteBotRepository {
    async fn get(&self, id: &str) -> Result<Option<BotRecord>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT record_json FROM bots WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(json,)| Self::decode(&json)).transpose()
    }

    async fn update_status(&self, id: &str, status: BotStatus) -> Result<Option<BotRecord>> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };
        record.status = status;
        record.updated_at = Utc::now();
        self.upsert(&record).await?;
        Ok(Some(record))
    }

    async fn find_by_status(&self, status: BotStatus) -> Result<Vec<BotRecord>> {
        let rows =
            sqlx::query_as::<_, (String,)>("SELECT record_json FROM bots WHERE status = ?1")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|(json,)| Self::decode(json)).collect()
    }

    async fn create(&self, record: BotRecord) -> Result<BotRecord> {
        self.upsert(&record).await?;
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bots WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<BotRecord>> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT record_json FROM bots")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|(json,)| Self::decode(json)).collect()
    }
}
