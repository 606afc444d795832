//! PostgreSQL implementation of the hash ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::{HashLedger, HashRecord, StoreError};
use crate::media::MessageRef;

/// PostgreSQL-backed ledger, one row per fingerprint.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct HashRow {
    fingerprint: String,
    message_id: String,
    channel_id: String,
    guild_id: Option<String>,
    thread_id: Option<String>,
    author_id: String,
    author_name: Option<String>,
    posted_at: DateTime<Utc>,
    inserted_at: DateTime<Utc>,
}

impl From<HashRow> for HashRecord {
    fn from(row: HashRow) -> Self {
        Self {
            fingerprint: row.fingerprint,
            message: MessageRef {
                id: row.message_id,
                channel_id: row.channel_id,
                guild_id: row.guild_id,
                thread_id: row.thread_id,
                author_id: row.author_id,
                author_name: row.author_name,
                timestamp: row.posted_at,
            },
            inserted_at: row.inserted_at,
        }
    }
}

impl PostgresLedger {
    /// Connect to the database and apply migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Hash ledger connected and migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl HashLedger for PostgresLedger {
    async fn load_all(&self) -> Result<Vec<HashRecord>, StoreError> {
        let rows: Vec<HashRow> = sqlx::query_as(
            r#"
            SELECT fingerprint, message_id, channel_id, guild_id, thread_id,
                   author_id, author_name, posted_at, inserted_at
            FROM media_hashes
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<HashRecord>, StoreError> {
        let row: Option<HashRow> = sqlx::query_as(
            r#"
            SELECT fingerprint, message_id, channel_id, guild_id, thread_id,
                   author_id, author_name, posted_at, inserted_at
            FROM media_hashes
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, record: &HashRecord) -> Result<(), StoreError> {
        let message = &record.message;
        sqlx::query(
            r#"
            INSERT INTO media_hashes
                (fingerprint, message_id, channel_id, guild_id, thread_id,
                 author_id, author_name, posted_at, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (fingerprint) DO UPDATE SET
                message_id = EXCLUDED.message_id,
                channel_id = EXCLUDED.channel_id,
                guild_id = EXCLUDED.guild_id,
                thread_id = EXCLUDED.thread_id,
                author_id = EXCLUDED.author_id,
                author_name = EXCLUDED.author_name,
                posted_at = EXCLUDED.posted_at,
                inserted_at = EXCLUDED.inserted_at
            "#,
        )
        .bind(&record.fingerprint)
        .bind(&message.id)
        .bind(&message.channel_id)
        .bind(&message.guild_id)
        .bind(&message.thread_id)
        .bind(&message.author_id)
        .bind(&message.author_name)
        .bind(message.timestamp)
        .bind(record.inserted_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(fingerprint = %record.fingerprint, "Upserted hash row");

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "PostgreSQL"
    }
}
