//! PostgreSQL content store, selected when `DATABASE_URL` is configured.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use teloxide::types::UserId;
use tracing::{debug, info};

use crate::content::{Appeal, PhotoRef, SlotContent, SlotId};
use crate::errors::StoreError;
use crate::store::ContentStore;

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS content_slots (
            slot_id TEXT PRIMARY KEY,
            body TEXT,
            photos TEXT NOT NULL DEFAULT '[]',
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create content_slots table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS appeals (
            id BIGSERIAL PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL,
            sender_id BIGINT NOT NULL,
            sender_name TEXT NOT NULL,
            body TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create appeals table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_admins (
            telegram_id BIGINT PRIMARY KEY,
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_admins table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Content store over a PostgreSQL pool
///
/// Photo sequences are kept as a JSON array in a text column.
#[derive(Debug, Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        init_database_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_photos(raw: &str) -> Result<Vec<PhotoRef>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn encode_photos(photos: &[PhotoRef]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(photos)?)
}

impl ContentStore for PgContentStore {
    async fn get(&self, slot: &SlotId) -> Result<Option<SlotContent>, StoreError> {
        let row: Option<(Option<String>, String)> =
            sqlx::query_as("SELECT body, photos FROM content_slots WHERE slot_id = $1")
                .bind(slot.storage_key())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(text, photos)| {
            Ok(SlotContent {
                text,
                photos: decode_photos(&photos)?,
            })
        })
        .transpose()
    }

    async fn set(&self, slot: &SlotId, content: SlotContent) -> Result<(), StoreError> {
        debug!(slot = %slot, photos = content.photos.len(), "Replacing slot content");
        sqlx::query(
            "INSERT INTO content_slots (slot_id, body, photos, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (slot_id)
             DO UPDATE SET body = EXCLUDED.body, photos = EXCLUDED.photos, updated_at = NOW()",
        )
        .bind(slot.storage_key())
        .bind(content.text)
        .bind(encode_photos(&content.photos)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_photo(&self, slot: &SlotId, photo: PhotoRef) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT photos FROM content_slots WHERE slot_id = $1 FOR UPDATE")
                .bind(slot.storage_key())
                .fetch_optional(&mut *tx)
                .await?;
        let mut photos = match existing {
            Some((raw,)) => decode_photos(&raw)?,
            None => Vec::new(),
        };
        photos.push(photo);

        sqlx::query(
            "INSERT INTO content_slots (slot_id, photos, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (slot_id)
             DO UPDATE SET photos = EXCLUDED.photos, updated_at = NOW()",
        )
        .bind(slot.storage_key())
        .bind(encode_photos(&photos)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(photos.len())
    }

    async fn append_appeal(&self, appeal: &Appeal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO appeals (created_at, sender_id, sender_name, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(appeal.timestamp)
        .bind(appeal.sender_id.0 as i64)
        .bind(&appeal.sender_display_name)
        .bind(&appeal.text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_appeals(&self, limit: usize) -> Result<Vec<Appeal>, StoreError> {
        let rows: Vec<(DateTime<Utc>, i64, String, String)> = sqlx::query_as(
            "SELECT created_at, sender_id, sender_name, body FROM appeals
             ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(timestamp, sender_id, sender_display_name, text)| Appeal {
                timestamp,
                sender_id: UserId(sender_id as u64),
                sender_display_name,
                text,
            })
            .collect())
    }

    async fn admins(&self) -> Result<BTreeSet<UserId>, StoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT telegram_id FROM bot_admins")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| UserId(id as u64)).collect())
    }

    async fn add_admin(&self, user_id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO bot_admins (telegram_id) VALUES ($1) ON CONFLICT (telegram_id) DO NOTHING",
        )
        .bind(user_id.0 as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
