//! In-memory index from logical keys to cached file paths

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct IndexedPath {
    path: PathBuf,
    /// Insertion order; larger is newer
    seq: u64,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<String, IndexedPath>,
    next_seq: u64,
}

/// Shared, cloneable handle to the key → path index
///
/// Clones share the same underlying map. Every mutation takes the write lock,
/// so inserts and eviction removals never interleave.
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    inner: Arc<RwLock<IndexState>>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        let state = self.inner.read().await;
        state.entries.get(key).map(|entry| entry.path.clone())
    }

    /// Record `key` at `path`; re-inserting an existing key makes it the newest entry
    pub async fn insert(&self, key: &str, path: PathBuf) {
        let mut state = self.inner.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .entries
            .insert(key.to_string(), IndexedPath { path, seq });
    }

    pub async fn remove(&self, key: &str) -> Option<PathBuf> {
        let mut state = self.inner.write().await;
        state.entries.remove(key).map(|entry| entry.path)
    }

    /// Drop every entry pointing at one of `paths`, returning how many were dropped
    pub async fn remove_paths(&self, paths: &HashSet<PathBuf>) -> usize {
        if paths.is_empty() {
            return 0;
        }
        let mut state = self.inner.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !paths.contains(&entry.path));
        before - state.entries.len()
    }

    /// Remove the oldest-inserted entries until at most `capacity` remain
    pub async fn prune_to(&self, capacity: usize) -> Vec<String> {
        let mut state = self.inner.write().await;
        if state.entries.len() <= capacity {
            return Vec::new();
        }

        let mut by_age: Vec<(u64, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.seq, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        let excess = state.entries.len() - capacity;
        let pruned: Vec<String> = by_age.into_iter().take(excess).map(|(_, key)| key).collect();
        for key in &pruned {
            state.entries.remove(key);
        }
        pruned
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every indexed path
    pub async fn paths(&self) -> Vec<PathBuf> {
        let state = self.inner.read().await;
        state.entries.values().map(|entry| entry.path.clone()).collect()
    }
}
