//! Durable memory store with two-tier lookup
//!
//! SQLite holds the durable record set (`interactions` and `memory_entries`
//! tables); bounded in-process caches answer the hot queries without I/O.
//! Writes are write-through: the durable insert happens first and a failure
//! leaves the caches untouched. Reads that have a cache behind them degrade
//! to cache-only results when the durable tier is down; reads without one
//! fail explicitly.

use crate::error::{Error, Result};
use crate::memory::cache::{
    ImportanceCache, RecencyCache, DEFAULT_IMPORTANCE_CAPACITY, DEFAULT_RECENCY_CAPACITY,
    IMPORTANCE_THRESHOLD,
};
use crate::memory::types::{Interaction, MemoryEntry, NewInteraction, NewMemoryEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Raw `interactions` row: id, timestamp, source, user_id, input_text,
/// output_text, metadata, session_id.
type InteractionRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

/// Raw `memory_entries` row: id, timestamp, category, content, tags,
/// importance, expires_at.
type MemoryRow = (String, String, String, String, String, f64, Option<String>);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS interactions (
        id TEXT PRIMARY KEY,
        timestamp TEXT NOT NULL,
        source TEXT NOT NULL,
        user_id TEXT NOT NULL,
        input_text TEXT NOT NULL,
        output_text TEXT NOT NULL,
        metadata TEXT,
        session_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS memory_entries (
        id TEXT PRIMARY KEY,
        timestamp TEXT NOT NULL,
        category TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL,
        importance REAL NOT NULL DEFAULT 0.5,
        expires_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_interactions_timestamp ON interactions(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_interactions_user_id ON interactions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_interactions_source ON interactions(source)",
    "CREATE INDEX IF NOT EXISTS idx_memory_category ON memory_entries(category)",
    "CREATE INDEX IF NOT EXISTS idx_memory_importance ON memory_entries(importance)",
    "CREATE INDEX IF NOT EXISTS idx_memory_timestamp ON memory_entries(timestamp)",
];

/// Structured health report for the memory subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryHealth {
    pub status: String,
    pub interactions: i64,
    pub memory_entries: i64,
    pub recency_cache: usize,
    pub importance_cache: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Durable, queryable storage for interactions and memory entries.
pub struct MemoryStore {
    pool: SqlitePool,
    recency: RecencyCache,
    important: ImportanceCache,
    /// Guard so assigned timestamps are strictly increasing even when the
    /// wall clock doesn't move between two stores
    last_assigned: Mutex<DateTime<Utc>>,
}

impl MemoryStore {
    /// Open (or create) the database at `path` and warm the caches.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        Self::from_pool(pool).await
    }

    /// Open an in-memory database. Used by tests and ephemeral deployments.
    pub async fn connect_in_memory() -> Result<Self> {
        // A second connection to ":memory:" would see a different database,
        // so the pool is pinned to one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .map_err(db_err)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(db_err)?;
        }

        let store = Self {
            pool,
            recency: RecencyCache::new(DEFAULT_RECENCY_CAPACITY),
            important: ImportanceCache::new(DEFAULT_IMPORTANCE_CAPACITY),
            last_assigned: Mutex::new(DateTime::<Utc>::MIN_UTC),
        };
        store.warm_caches().await?;

        tracing::info!("Memory store initialized");
        Ok(store)
    }

    /// Load the newest interactions and the top important entries into the
    /// caches so the first queries after startup avoid I/O.
    async fn warm_caches(&self) -> Result<()> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            "SELECT id, timestamp, source, user_id, input_text, output_text, metadata, session_id
             FROM interactions ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(DEFAULT_RECENCY_CAPACITY as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        for row in rows {
            self.recency.insert(interaction_from_row(row)?).await;
        }

        let rows: Vec<MemoryRow> = sqlx::query_as(
            "SELECT id, timestamp, category, content, tags, importance, expires_at
             FROM memory_entries WHERE importance > ?
             ORDER BY importance DESC, timestamp DESC LIMIT ?",
        )
        .bind(IMPORTANCE_THRESHOLD)
        .bind(DEFAULT_IMPORTANCE_CAPACITY as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        for row in rows {
            self.important.insert(memory_from_row(row)?).await;
        }

        Ok(())
    }

    /// Close the connection pool. Further durable operations fail with a
    /// persistence error; cache-backed reads keep serving cached data.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Store an interaction: durable insert first, then the recency cache.
    ///
    /// Id and timestamp are assigned when absent. The cache is not updated
    /// if the durable write fails.
    pub async fn store_interaction(&self, new: NewInteraction) -> Result<Interaction> {
        let timestamp = match new.timestamp {
            Some(ts) => truncate_to_micros(ts),
            None => self.next_timestamp().await,
        };
        let interaction = Interaction {
            id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            timestamp,
            source: or_unknown(new.source),
            user_id: or_unknown(new.user_id),
            input_text: new.input_text,
            output_text: new.output_text,
            metadata: new.metadata,
            session_id: new.session_id,
        };

        let metadata_text = match &interaction.metadata {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        sqlx::query(
            "INSERT INTO interactions
             (id, timestamp, source, user_id, input_text, output_text, metadata, session_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&interaction.id)
        .bind(ts_to_text(&interaction.timestamp))
        .bind(&interaction.source)
        .bind(&interaction.user_id)
        .bind(&interaction.input_text)
        .bind(&interaction.output_text)
        .bind(&metadata_text)
        .bind(&interaction.session_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(evicted) = self.recency.insert(interaction.clone()).await {
            tracing::debug!(evicted = %evicted, "Recency cache evicted oldest interaction");
        }

        tracing::debug!(id = %interaction.id, "Stored interaction");
        Ok(interaction)
    }

    /// Store a memory entry; entries above the importance threshold are
    /// additionally cached.
    pub async fn store_memory(&self, new: NewMemoryEntry) -> Result<MemoryEntry> {
        let importance = new.importance.unwrap_or(0.5);
        if !(0.0..=1.0).contains(&importance) {
            return Err(Error::Validation(format!(
                "importance must be in [0.0, 1.0], got {}",
                importance
            )));
        }

        let timestamp = match new.timestamp {
            Some(ts) => truncate_to_micros(ts),
            None => self.next_timestamp().await,
        };
        let entry = MemoryEntry {
            id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            timestamp,
            category: if new.category.is_empty() {
                "general".to_string()
            } else {
                new.category
            },
            content: new.content,
            tags: new.tags,
            importance,
            expires_at: new.expires_at.map(truncate_to_micros),
        };

        sqlx::query(
            "INSERT INTO memory_entries
             (id, timestamp, category, content, tags, importance, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(ts_to_text(&entry.timestamp))
        .bind(&entry.category)
        .bind(&entry.content)
        .bind(serde_json::to_string(&entry.tags)?)
        .bind(entry.importance)
        .bind(entry.expires_at.as_ref().map(ts_to_text))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.important.insert(entry.clone()).await;

        tracing::debug!(id = %entry.id, category = %entry.category, "Stored memory entry");
        Ok(entry)
    }

    /// Recent interactions, newest first, at most `limit`.
    ///
    /// With a user filter this queries durable storage only and surfaces
    /// failures. Without one, the recency cache is merged with durable
    /// results (deduplicated by id) and a durable failure degrades to the
    /// cached view.
    pub async fn get_recent_interactions(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        if let Some(user_id) = user_id {
            let rows: Vec<InteractionRow> = sqlx::query_as(
                "SELECT id, timestamp, source, user_id, input_text, output_text, metadata, session_id
                 FROM interactions WHERE user_id = ?
                 ORDER BY timestamp DESC LIMIT ?",
            )
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            return rows.into_iter().map(interaction_from_row).collect();
        }

        let mut results = self.recency.snapshot_desc().await;

        let db_rows: std::result::Result<Vec<InteractionRow>, sqlx::Error> = sqlx::query_as(
            "SELECT id, timestamp, source, user_id, input_text, output_text, metadata, session_id
             FROM interactions ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await;

        match db_rows {
            Ok(rows) => {
                for row in rows {
                    let interaction = interaction_from_row(row)?;
                    if !results.iter().any(|cached| cached.id == interaction.id) {
                        results.push(interaction);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Durable store unavailable, serving recent interactions from cache: {}",
                    e
                );
            }
        }

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);
        Ok(results)
    }

    /// Search memory entries by case-insensitive substring match against
    /// content and joined tag text.
    ///
    /// The importance cache is consulted first (no I/O), then durable
    /// storage with the same predicate plus an optional category filter,
    /// deduplicated by id. Expired entries are never returned. Results are
    /// ordered importance-descending, then timestamp-descending.
    pub async fn search_memory(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let now = Utc::now();
        let mut results = self.important.search(query, category, now).await;

        let pattern = format!("%{}%", query);
        let now_text = ts_to_text(&now);
        let db_rows: std::result::Result<Vec<MemoryRow>, sqlx::Error> = match category {
            Some(category) => {
                sqlx::query_as(
                    "SELECT id, timestamp, category, content, tags, importance, expires_at
                     FROM memory_entries
                     WHERE (content LIKE ? OR tags LIKE ?)
                       AND (expires_at IS NULL OR expires_at >= ?)
                       AND category = ?
                     ORDER BY importance DESC, timestamp DESC LIMIT ?",
                )
                .bind(&pattern)
                .bind(&pattern)
                .bind(&now_text)
                .bind(category)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT id, timestamp, category, content, tags, importance, expires_at
                     FROM memory_entries
                     WHERE (content LIKE ? OR tags LIKE ?)
                       AND (expires_at IS NULL OR expires_at >= ?)
                     ORDER BY importance DESC, timestamp DESC LIMIT ?",
                )
                .bind(&pattern)
                .bind(&pattern)
                .bind(&now_text)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        };

        match db_rows {
            Ok(rows) => {
                for row in rows {
                    let entry = memory_from_row(row)?;
                    if !results.iter().any(|cached| cached.id == entry.id) {
                        results.push(entry);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Durable store unavailable, serving memory search from cache: {}",
                    e
                );
            }
        }

        // Relevance policy: importance dominates recency
        results.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Delete every entry whose expiry is strictly in the past, from both
    /// durable storage and the importance cache.
    ///
    /// The durable delete runs in one transaction: the whole batch commits
    /// or none of it does. Returns the number of entries removed.
    pub async fn cleanup_expired_entries(&self) -> Result<u64> {
        let now_text = ts_to_text(&Utc::now());

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let expired: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM memory_entries WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(&now_text)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        if expired.is_empty() {
            tx.commit().await.map_err(db_err)?;
            return Ok(0);
        }

        sqlx::query("DELETE FROM memory_entries WHERE expires_at IS NOT NULL AND expires_at < ?")
            .bind(&now_text)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        let ids: Vec<String> = expired.into_iter().map(|(id,)| id).collect();
        self.important.remove_many(&ids).await;

        tracing::info!(count = ids.len(), "Cleaned up expired memory entries");
        Ok(ids.len() as u64)
    }

    /// Report durable record counts and cache sizes.
    ///
    /// Never fails: a durable-tier failure produces a report with
    /// `status: "error"` instead of propagating.
    pub async fn health_check(&self) -> MemoryHealth {
        let counts: std::result::Result<(i64, i64), sqlx::Error> = async {
            let (interactions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM interactions")
                .fetch_one(&self.pool)
                .await?;
            let (entries,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memory_entries")
                .fetch_one(&self.pool)
                .await?;
            Ok((interactions, entries))
        }
        .await;

        match counts {
            Ok((interactions, memory_entries)) => MemoryHealth {
                status: "healthy".to_string(),
                interactions,
                memory_entries,
                recency_cache: self.recency.len().await,
                importance_cache: self.important.len().await,
                timestamp: Utc::now(),
                error: None,
            },
            Err(e) => {
                tracing::error!("Memory health check failed: {}", e);
                MemoryHealth {
                    status: "error".to_string(),
                    interactions: 0,
                    memory_entries: 0,
                    recency_cache: self.recency.len().await,
                    importance_cache: self.important.len().await,
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Next assigned timestamp: the current instant, bumped by 1µs past the
    /// previous assignment if the clock hasn't advanced.
    async fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_assigned.lock().await;
        let mut now = truncate_to_micros(Utc::now());
        if now <= *last {
            now = *last + chrono::Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Persistence(e.to_string())
}

/// Timestamps are stored as fixed-width RFC 3339 text so that lexical order
/// in SQL matches chronological order.
fn ts_to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_text(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("invalid stored timestamp {:?}: {}", text, e)))
}

/// Drop sub-microsecond precision so a timestamp survives the text
/// round-trip unchanged.
fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let extra_nanos = (ts.timestamp_subsec_nanos() % 1_000) as i64;
    ts - chrono::Duration::nanoseconds(extra_nanos)
}

fn interaction_from_row(row: InteractionRow) -> Result<Interaction> {
    let (id, timestamp, source, user_id, input_text, output_text, metadata, session_id) = row;
    Ok(Interaction {
        id,
        timestamp: ts_from_text(&timestamp)?,
        source,
        user_id,
        input_text,
        output_text,
        metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
        session_id,
    })
}

fn memory_from_row(row: MemoryRow) -> Result<MemoryEntry> {
    let (id, timestamp, category, content, tags, importance, expires_at) = row;
    Ok(MemoryEntry {
        id,
        timestamp: ts_from_text(&timestamp)?,
        category,
        content,
        tags: serde_json::from_str(&tags)?,
        importance,
        expires_at: expires_at.as_deref().map(ts_from_text).transpose()?,
    })
}
