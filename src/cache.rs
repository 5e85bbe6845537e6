// src/cache.rs
//! Per-user local cache for pending-request placeholders and request
//! history. Conceptually a tiny key-value store namespaced by owner:
//! in-memory for tests and session-only use, SQLite-backed to survive
//! restarts. Callers treat every operation as best-effort.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::types::PhotoRequest;

/// A cached `file_url` longer than this is dropped before persisting,
/// to keep data-URL payloads from exhausting the storage quota.
pub const CACHE_FILE_URL_MAX: usize = 1024 * 1024;

const KIND_PENDING: &str = "pending";
const KIND_HISTORY: &str = "history";

/// Narrow cache interface: lookups and invalidation are always keyed by
/// the owning user, never ambient. Futures are `Send` so the polling
/// task can run a store-backed flow on the runtime.
pub trait CacheStore: Send + Sync {
    fn pending_for(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Option<PhotoRequest>>> + Send;
    fn put_pending(&self, entry: &PhotoRequest) -> impl Future<Output = Result<()>> + Send;
    fn clear_pending(&self, owner: &str) -> impl Future<Output = Result<()>> + Send;
    fn history_for(&self, owner: &str) -> impl Future<Output = Result<Vec<PhotoRequest>>> + Send;
    fn put_history(
        &self,
        owner: &str,
        entries: &[PhotoRequest],
    ) -> impl Future<Output = Result<()>> + Send;
    /// Remove every entry not belonging to `keep_owner`. Called on
    /// identity switch so no state leaks across accounts.
    fn purge_other_users(&self, keep_owner: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Strip oversized inline payloads before persisting.
fn trim_for_cache(entry: &PhotoRequest) -> PhotoRequest {
    let mut trimmed = entry.clone();
    if trimmed
        .file_url
        .as_ref()
        .is_some_and(|url| url.len() > CACHE_FILE_URL_MAX)
    {
        trimmed.file_url = None;
    }
    trimmed
}

// ===== In-memory store =====

#[derive(Debug, Default)]
pub struct MemoryCache {
    pending: Mutex<HashMap<String, PhotoRequest>>,
    history: Mutex<HashMap<String, Vec<PhotoRequest>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    async fn pending_for(&self, owner: &str) -> Result<Option<PhotoRequest>> {
        Ok(self.pending.lock().unwrap().get(owner).cloned())
    }

    async fn put_pending(&self, entry: &PhotoRequest) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .insert(entry.owner_user_id.clone(), entry.clone());
        Ok(())
    }

    async fn clear_pending(&self, owner: &str) -> Result<()> {
        self.pending.lock().unwrap().remove(owner);
        Ok(())
    }

    async fn history_for(&self, owner: &str) -> Result<Vec<PhotoRequest>> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_history(&self, owner: &str, entries: &[PhotoRequest]) -> Result<()> {
        self.history
            .lock()
            .unwrap()
            .insert(owner.to_string(), entries.to_vec());
        Ok(())
    }

    async fn purge_other_users(&self, keep_owner: &str) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .retain(|owner, _| owner == keep_owner);
        self.history
            .lock()
            .unwrap()
            .retain(|owner, _| owner == keep_owner);
        Ok(())
    }
}

// ===== SQLite-backed store =====

#[derive(Debug)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (creating if needed) the cache database and run migrations.
    pub async fn open(database_path: PathBuf) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create cache directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url)
            .await
            .context("Failed to connect to SQLite cache database")?;

        let cache = Self { pool };
        cache.migrate().await?;
        info!("Photo cache initialized: {}", database_url);
        Ok(cache)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS photo_cache (
                owner_user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner_user_id, kind)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, owner: &str, kind: &str) -> Result<Option<String>> {
        let payload: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT payload FROM photo_cache
            WHERE owner_user_id = ? AND kind = ?
            "#,
        )
        .bind(owner)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload.map(|(p,)| p))
    }

    async fn store(&self, owner: &str, kind: &str, payload: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO photo_cache (owner_user_id, kind, payload, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(owner)
        .bind(kind)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, owner: &str, kind: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM photo_cache
            WHERE owner_user_id = ? AND kind = ?
            "#,
        )
        .bind(owner)
        .bind(kind)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl CacheStore for SqliteCache {
    async fn pending_for(&self, owner: &str) -> Result<Option<PhotoRequest>> {
        let Some(payload) = self.load(owner, KIND_PENDING).await? else {
            return Ok(None);
        };

        // A corrupted entry is treated as absent, never an error.
        match serde_json::from_str(&payload) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Discarding unparseable pending cache entry for {}: {}", owner, e);
                Ok(None)
            }
        }
    }

    async fn put_pending(&self, entry: &PhotoRequest) -> Result<()> {
        let trimmed = trim_for_cache(entry);
        let payload = serde_json::to_string(&trimmed)?;
        self.store(&trimmed.owner_user_id, KIND_PENDING, &payload).await
    }

    async fn clear_pending(&self, owner: &str) -> Result<()> {
        self.delete(owner, KIND_PENDING).await
    }

    async fn history_for(&self, owner: &str) -> Result<Vec<PhotoRequest>> {
        let Some(payload) = self.load(owner, KIND_HISTORY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&payload) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Discarding unparseable history cache for {}: {}", owner, e);
                Ok(Vec::new())
            }
        }
    }

    async fn put_history(&self, owner: &str, entries: &[PhotoRequest]) -> Result<()> {
        let trimmed: Vec<PhotoRequest> = entries.iter().map(trim_for_cache).collect();
        let payload = serde_json::to_string(&trimmed)?;
        self.store(owner, KIND_HISTORY, &payload).await
    }

    async fn purge_other_users(&self, keep_owner: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM photo_cache
            WHERE owner_user_id != ?
            "#,
        )
        .bind(keep_owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "Purged {} cache entries from other users",
                result.rows_affected()
            );
        }
        Ok(())
    }
}
