//! Search Index
//!
//! Case-insensitive key search over a snapshot. The index for a snapshot is a
//! flat list of every node below the root; since snapshots are immutable it is
//! cached by root hash and never invalidated, only evicted.

use crate::error::ApiError;
use crate::tree::{SnapshotNode, SnapshotTree};
use crate::types::NodeID;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SEARCH_CACHE_CAPACITY: usize = 16;

const SCORE_EXACT_KEY: f32 = 1.0;
const SCORE_KEY_PREFIX: f32 = 0.75;
const SCORE_KEY_SUBSTRING: f32 = 0.5;
const SCORE_PATH_SUBSTRING: f32 = 0.25;

/// One search hit. Directory hits carry no children; resolve the path to
/// read the subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub node: SnapshotNode,
    pub relevance_score: f32,
}

#[derive(Debug)]
struct IndexEntry {
    path: String,
    key: String,
    node_id: NodeID,
    key_folded: String,
    path_folded: String,
}

struct IndexCache {
    entries: HashMap<NodeID, Arc<Vec<IndexEntry>>>,
    order: VecDeque<NodeID>,
}

/// Per-snapshot key index with a bounded cache.
pub struct SearchIndex {
    tree: Arc<SnapshotTree>,
    cache: Mutex<IndexCache>,
    capacity: usize,
}

impl SearchIndex {
    pub fn new(tree: Arc<SnapshotTree>, capacity: usize) -> Self {
        Self {
            tree,
            cache: Mutex::new(IndexCache {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// All matches for `query` under `root`, best first.
    pub fn search(&self, root: &NodeID, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.search_limited(root, query, usize::MAX)
    }

    /// At most `limit` matches for `query` under `root`, best first.
    pub fn search_limited(
        &self,
        root: &NodeID,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let index = self.index_for(root)?;
        let folded = query.to_lowercase();

        let mut hits: Vec<(&IndexEntry, f32)> = index
            .iter()
            .filter_map(|entry| score(entry, &folded).map(|s| (entry, s)))
            .collect();
        hits.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.path.cmp(&b.path)));

        let mut results = Vec::with_capacity(hits.len().min(limit));
        for (entry, relevance_score) in hits.into_iter().take(limit) {
            results.push(SearchResult {
                path: entry.path.clone(),
                node: self.tree.materialize_shallow(&entry.key, &entry.node_id)?,
                relevance_score,
            });
        }
        debug!(query, results = results.len(), "Search completed");
        Ok(results)
    }

    fn index_for(&self, root: &NodeID) -> Result<Arc<Vec<IndexEntry>>, ApiError> {
        if let Some(index) = self.cache.lock().entries.get(root) {
            debug!("Search index cache hit");
            return Ok(index.clone());
        }

        let index: Vec<IndexEntry> = self
            .tree
            .walk(root)?
            .into_iter()
            .map(|entry| IndexEntry {
                key_folded: entry.key.to_lowercase(),
                path_folded: entry.path.to_lowercase(),
                path: entry.path,
                key: entry.key,
                node_id: entry.node_id,
            })
            .collect();
        let index = Arc::new(index);
        debug!(entries = index.len(), "Built search index");

        let mut cache = self.cache.lock();
        if !cache.entries.contains_key(root) {
            while cache.order.len() >= self.capacity {
                if let Some(evicted) = cache.order.pop_front() {
                    cache.entries.remove(&evicted);
                }
            }
            cache.order.push_back(*root);
            cache.entries.insert(*root, index.clone());
        }
        Ok(index)
    }

    /// Number of cached snapshot indexes.
    pub fn cached_snapshots(&self) -> usize {
        self.cache.lock().entries.len()
    }
}

fn score(entry: &IndexEntry, query: &str) -> Option<f32> {
    if entry.key_folded == query {
        Some(SCORE_EXACT_KEY)
    } else if entry.key_folded.starts_with(query) {
        Some(SCORE_KEY_PREFIX)
    } else if entry.key_folded.contains(query) {
        Some(SCORE_KEY_SUBSTRING)
    } else if entry.path_folded.contains(query) {
        Some(SCORE_PATH_SUBSTRING)
    } else {
        None
    }
}
