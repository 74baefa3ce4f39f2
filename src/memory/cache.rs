//! Bounded in-memory caches for the memory store
//!
//! Two explicit cache objects sit in front of the durable tier:
//!
//! - [`RecencyCache`] holds the most recent interactions in timestamp order.
//!   When full, the oldest-by-timestamp entry is evicted.
//! - [`ImportanceCache`] holds high-value memory entries (importance above
//!   [`IMPORTANCE_THRESHOLD`]) keyed by id. When full, the lowest-importance
//!   (then oldest) entry is evicted.
//!
//! Both mutate under a single write lock so readers never observe a torn
//! insert/evict pair.

use crate::memory::types::{Interaction, MemoryEntry};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Entries kept in the recency cache.
pub const DEFAULT_RECENCY_CAPACITY: usize = 100;

/// Entries kept in the importance cache.
pub const DEFAULT_IMPORTANCE_CAPACITY: usize = 50;

/// Minimum importance (exclusive) for an entry to be cached.
pub const IMPORTANCE_THRESHOLD: f64 = 0.7;

/// Bounded cache of the most recent interactions, ordered by timestamp.
pub struct RecencyCache {
    inner: RwLock<RecencyInner>,
}

struct RecencyInner {
    capacity: usize,
    /// Keyed by (timestamp, id): iteration order is oldest-first
    by_time: BTreeMap<(DateTime<Utc>, String), Interaction>,
    ids: HashSet<String>,
}

impl RecencyCache {
    /// Create a cache holding at most `capacity` interactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(RecencyInner {
                capacity,
                by_time: BTreeMap::new(),
                ids: HashSet::new(),
            }),
        }
    }

    /// Insert an interaction, evicting the oldest entry once over capacity.
    ///
    /// Insert and evict happen under one write lock. Returns the evicted
    /// interaction's id if eviction occurred.
    pub async fn insert(&self, interaction: Interaction) -> Option<String> {
        let mut inner = self.inner.write().await;

        if inner.ids.contains(&interaction.id) {
            let id = interaction.id.clone();
            inner.by_time.retain(|_, v| v.id != id);
        }
        inner.ids.insert(interaction.id.clone());
        inner
            .by_time
            .insert((interaction.timestamp, interaction.id.clone()), interaction);

        if inner.by_time.len() > inner.capacity {
            Self::evict_oldest(&mut inner)
        } else {
            None
        }
    }

    /// Evict the oldest-by-timestamp entry.
    fn evict_oldest(inner: &mut RecencyInner) -> Option<String> {
        let ((_, id), _) = inner.by_time.pop_first()?;
        inner.ids.remove(&id);
        Some(id)
    }

    /// All cached interactions, newest first.
    pub async fn snapshot_desc(&self) -> Vec<Interaction> {
        self.inner
            .read()
            .await
            .by_time
            .values()
            .rev()
            .cloned()
            .collect()
    }

    /// Whether an interaction id is cached.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.ids.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_time.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.by_time.is_empty()
    }
}

/// Bounded cache of high-importance memory entries, keyed by id.
///
/// An optimization for frequently-needed high-value entries, not a
/// correctness requirement: search results are identical with the cache
/// empty as long as the durable tier is reachable.
pub struct ImportanceCache {
    inner: RwLock<ImportanceInner>,
}

struct ImportanceInner {
    capacity: usize,
    entries: HashMap<String, MemoryEntry>,
}

impl ImportanceCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(ImportanceInner {
                capacity,
                entries: HashMap::new(),
            }),
        }
    }

    /// Insert an entry if its importance exceeds [`IMPORTANCE_THRESHOLD`].
    ///
    /// Returns whether the entry was cached. When over capacity the
    /// lowest-importance (then oldest) entry is evicted first.
    pub async fn insert(&self, entry: MemoryEntry) -> bool {
        if entry.importance <= IMPORTANCE_THRESHOLD {
            return false;
        }

        let mut inner = self.inner.write().await;
        if !inner.entries.contains_key(&entry.id) && inner.entries.len() >= inner.capacity {
            Self::evict_least_important(&mut inner);
        }
        inner.entries.insert(entry.id.clone(), entry);
        true
    }

    fn evict_least_important(inner: &mut ImportanceInner) {
        let victim = inner
            .entries
            .values()
            .min_by(|a, b| {
                a.importance
                    .partial_cmp(&b.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.timestamp.cmp(&b.timestamp))
            })
            .map(|e| e.id.clone());
        if let Some(id) = victim {
            inner.entries.remove(&id);
        }
    }

    /// Case-insensitive substring search over content and joined tag text.
    ///
    /// Entries past their expiry at `now` are never returned, and an
    /// optional category must match exactly.
    pub async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<MemoryEntry> {
        let needle = query.to_lowercase();
        self.inner
            .read()
            .await
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .filter(|entry| category.map_or(true, |c| entry.category == c))
            .filter(|entry| {
                entry.content.to_lowercase().contains(&needle)
                    || entry.tags.join(" ").to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Drop the given ids from the cache.
    pub async fn remove_many(&self, ids: &[String]) {
        let mut inner = self.inner.write().await;
        for id in ids {
            inner.entries.remove(id);
        }
    }

    /// Whether an entry id is cached.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.entries.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
