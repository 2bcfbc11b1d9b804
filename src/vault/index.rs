//! In-memory vector store with cosine-distance search.
//!
//! Items live in a `Vec` so iteration order is stable, with a side table of
//! id -> slot for replace-in-place upserts. Both sit behind one `RwLock`.
//! Embedding always happens before the lock is taken.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::vault::embeddings::{l2_norm, Embedder};
use crate::vault::metadata::{matches_filters, Metadata};

/// Default number of hits returned by a query
pub const DEFAULT_TOP_K: usize = 5;

/// An entry in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedItem {
    /// Unique key; a second upsert with the same id replaces this item
    pub id: String,
    /// The embedding vector
    pub vector: Vec<f64>,
    /// Text the vector was computed from
    pub contents: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    /// Cosine distance, smaller is closer
    pub distance: f64,
    pub metadata: Metadata,
    pub contents: String,
}

/// Outcome of an upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
}

#[derive(Default)]
struct Slots {
    items: Vec<IndexedItem>,
    positions: HashMap<String, usize>,
}

/// Shared in-memory vector store.
///
/// All methods take `&self`; share it behind an `Arc`.
pub struct VectorStore {
    embedder: Arc<Embedder>,
    slots: RwLock<Slots>,
}

impl VectorStore {
    /// Create an empty store bound to an embedder.
    pub fn new(embedder: Arc<Embedder>) -> Self {
        Self {
            embedder,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Dimensions of the bound embedder.
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    /// Get a copy of an item by id.
    pub fn get(&self, id: &str) -> Option<IndexedItem> {
        let slots = self.read();
        slots.positions.get(id).map(|&pos| slots.items[pos].clone())
    }

    /// All ids in iteration order.
    pub fn ids(&self) -> Vec<String> {
        self.read().items.iter().map(|it| it.id.clone()).collect()
    }

    /// Drop every item. Reset hook for tests that reuse one store.
    #[cfg(test)]
    pub fn clear(&self) {
        let mut slots = self.write();
        slots.items.clear();
        slots.positions.clear();
    }

    /// Insert or replace items by id.
    ///
    /// The lock is taken per item, so a concurrent query may observe part of
    /// a batch but never a half-written item.
    pub fn upsert(&self, items: Vec<IndexedItem>) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for item in items {
            if item.vector.len() != self.dimensions() {
                log::debug!(
                    "upserting id={} with {} dimensions, store uses {}",
                    item.id,
                    item.vector.len(),
                    self.dimensions()
                );
            }

            let mut slots = self.write();
            match slots.positions.get(&item.id).copied() {
                Some(pos) => {
                    slots.items[pos] = item;
                    summary.replaced += 1;
                }
                None => {
                    let pos = slots.items.len();
                    slots.positions.insert(item.id.clone(), pos);
                    slots.items.push(item);
                    summary.inserted += 1;
                }
            }
        }

        summary
    }

    /// Search by text. The query is embedded with the bound embedder.
    pub fn query(&self, query_text: &str, top_k: usize, filters: Option<&Metadata>) -> Vec<Hit> {
        let query = self.embedder.embed(query_text);
        self.query_vector(&query, top_k, filters)
    }

    /// Search by a precomputed vector.
    ///
    /// Returns up to `top_k` hits (at least one slot, `0` is treated as `1`)
    /// ordered by ascending cosine distance. Ties keep store order.
    pub fn query_vector(
        &self,
        query: &[f64],
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Vec<Hit> {
        let top_k = top_k.max(1);
        let query_norm = l2_norm(query);

        let slots = self.read();

        let mut scored: Vec<(f64, usize)> = slots
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| match filters {
                Some(filters) => matches_filters(&item.metadata, filters),
                None => true,
            })
            .map(|(pos, item)| {
                let distance = cosine_distance(query, query_norm, &item.vector);
                (distance, pos)
            })
            .collect();

        // sort_by is stable, equal distances keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(distance, pos)| {
                let item = &slots.items[pos];
                Hit {
                    id: item.id.clone(),
                    distance,
                    metadata: item.metadata.clone(),
                    contents: item.contents.clone(),
                }
            })
            .collect()
    }

    // Every write is a single assignment or push, so the data behind a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("embedder", &self.embedder)
            .field("len", &self.len())
            .finish()
    }
}

/// `1 - cosine similarity`, computed over the overlapping prefix.
///
/// A zero norm on either side gives similarity 0, i.e. distance 1.
pub fn cosine_distance(query: &[f64], query_norm: f64, target: &[f64]) -> f64 {
    1.0 - cosine_similarity(query, query_norm, target)
}

fn cosine_similarity(query: &[f64], query_norm: f64, target: &[f64]) -> f64 {
    let n = query.len().min(target.len());
    if n == 0 {
        return 0.0;
    }

    // only recompute the query norm when the prefix is shorter
    let query_norm = if n == query.len() {
        query_norm
    } else {
        l2_norm(&query[..n])
    };
    let target_norm = l2_norm(&target[..n]);

    let denom = query_norm * target_norm;
    if denom == 0.0 {
        return 0.0;
    }

    let dot: f64 = query[..n]
        .iter()
        .zip(&target[..n])
        .map(|(a, b)| a * b)
        .sum();
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn store(dimensions: usize) -> VectorStore {
        VectorStore::new(Arc::new(Embedder::hashing(dimensions)))
    }

    fn item(id: &str, vector: Vec<f64>, contents: &str, metadata: Metadata) -> IndexedItem {
        IndexedItem {
            id: id.to_string(),
            vector,
            contents: contents.to_string(),
            metadata,
        }
    }

    #[test]
    fn test_new_store() {
        let store = store(384);
        assert_eq!(store.dimensions(), 384);
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_upsert_and_get() {
        let store = store(3);
        let summary = store.upsert(vec![item("a", vec![1.0, 0.0, 0.0], "A", metadata!())]);

        assert_eq!((summary.inserted, summary.replaced), (1, 0));
        assert_eq!(store.get("a").unwrap().contents, "A");
        assert!(store.get("b").is_none());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = store(3);
        store.upsert(vec![
            item("x", vec![1.0, 0.0, 0.0], "A", metadata!()),
            item("y", vec![0.0, 1.0, 0.0], "Y", metadata!()),
        ]);

        let summary = store.upsert(vec![item("x", vec![0.0, 0.0, 1.0], "B", metadata!())]);

        assert_eq!((summary.inserted, summary.replaced), (0, 1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec!["x", "y"]);
        assert_eq!(store.get("x").unwrap().contents, "B");
        assert_eq!(store.get("x").unwrap().vector, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_clear_resets_store() {
        let store = store(3);
        store.upsert(vec![item("a", vec![1.0, 0.0, 0.0], "A", metadata!())]);

        store.clear();
        assert!(store.is_empty());
        assert!(store.get("a").is_none());

        let summary = store.upsert(vec![item("a", vec![0.0, 1.0, 0.0], "A", metadata!())]);
        assert_eq!((summary.inserted, summary.replaced), (1, 0));
    }

    #[test]
    fn test_duplicate_ids_in_one_batch() {
        let store = store(3);
        let summary = store.upsert(vec![
            item("x", vec![1.0, 0.0, 0.0], "first", metadata!()),
            item("x", vec![0.0, 1.0, 0.0], "second", metadata!()),
        ]);

        assert_eq!((summary.inserted, summary.replaced), (1, 1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("x").unwrap().contents, "second");
    }

    #[test]
    fn test_query_vector_orders_by_distance() {
        let store = store(3);
        store.upsert(vec![
            item("far", vec![0.0, 1.0, 0.0], "far", metadata!()),
            item("near", vec![1.0, 0.0, 0.0], "near", metadata!()),
            item("mid", vec![1.0, 1.0, 0.0], "mid", metadata!()),
        ]);

        let hits = store.query_vector(&[1.0, 0.1, 0.0], 10, None);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();

        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_top_k_zero_is_clamped() {
        let store = store(2);
        store.upsert(vec![
            item("a", vec![1.0, 0.0], "a", metadata!()),
            item("b", vec![0.0, 1.0], "b", metadata!()),
        ]);

        assert_eq!(store.query_vector(&[1.0, 0.0], 0, None).len(), 1);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let store = store(2);
        for id in ["first", "second", "third"] {
            store.upsert(vec![item(id, vec![0.0, 1.0], id, metadata!())]);
        }

        let hits = store.query_vector(&[1.0, 0.0], 3, None);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_filters_exclude_non_matching() {
        let store = store(2);
        let note = metadata! { "type" => "note" };
        let lab = metadata! { "type" => "lab" };
        store.upsert(vec![
            item("note", vec![1.0, 0.0], "note", note.clone()),
            item("lab", vec![1.0, 0.0], "lab", lab),
            item("bare", vec![1.0, 0.0], "bare", metadata!()),
        ]);

        let hits = store.query_vector(&[1.0, 0.0], 10, Some(&note));

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "note");
    }

    #[test]
    fn test_zero_vectors_have_distance_one() {
        let store = store(2);
        store.upsert(vec![item("zero", vec![0.0, 0.0], "zero", metadata!())]);

        let hits = store.query_vector(&[1.0, 0.0], 1, None);
        assert_eq!(hits[0].distance, 1.0);

        let hits = store.query_vector(&[0.0, 0.0], 1, None);
        assert_eq!(hits[0].distance, 1.0);
    }

    #[test]
    fn test_mismatched_lengths_use_prefix() {
        let store = store(3);
        store.upsert(vec![
            item("short", vec![1.0, 0.0], "short", metadata!()),
            item("long", vec![1.0, 0.0, 0.0, 5.0], "long", metadata!()),
        ]);

        let hits = store.query_vector(&[1.0, 0.0, 0.0], 2, None);
        assert_eq!(hits.len(), 2);
        for hit in hits {
            assert!(hit.distance.abs() < 1e-12, "{}", hit.id);
        }
    }

    #[test]
    fn test_query_embeds_text() {
        let store = store(64);
        let embedded = |id: &str, text: &str| {
            let vector = store.embedder().embed(text);
            item(id, vector, text, metadata!())
        };
        store.upsert(vec![
            embedded("fever", "high fever"),
            embedded("rash", "itchy rash"),
        ]);

        let hits = store.query("high fever", 1, None);
        assert_eq!(hits[0].id, "fever");
        assert!(hits[0].distance.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_distance() {
        let a = [1.0, 0.0, 0.0];
        let distance = |b: &[f64]| cosine_distance(&a, 1.0, b);

        assert!(distance(&[1.0, 0.0, 0.0]).abs() < 1e-12);
        assert!((distance(&[0.0, 1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!((distance(&[-1.0, 0.0, 0.0]) - 2.0).abs() < 1e-12);
        assert_eq!(distance(&[]), 1.0);
    }
}
