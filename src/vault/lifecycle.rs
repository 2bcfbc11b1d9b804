//! Lazy, race-free construction of the shared vector store.
//!
//! An [`IndexCell`] creates its store on first access and hands the same
//! `Arc` to every later caller. The embedder passed by the first caller is
//! the one the store keeps; embedders passed afterwards are ignored.
//!
//! The composition root owns an `IndexCell` and passes the store handle
//! down, so separate cells give isolated stores.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::vault::embeddings::Embedder;
use crate::vault::index::VectorStore;

/// Holds at most one [`VectorStore`], created on first use.
#[derive(Debug, Default)]
pub struct IndexCell {
    store: OnceCell<Arc<VectorStore>>,
}

impl IndexCell {
    pub const fn new() -> Self {
        Self {
            store: OnceCell::new(),
        }
    }

    /// Get the store, creating it with `embedder` if this is the first call.
    ///
    /// Concurrent first calls block until one of them has built the store;
    /// exactly one store is ever created per cell.
    pub fn get_index(&self, embedder: Arc<Embedder>) -> Arc<VectorStore> {
        self.store
            .get_or_init(|| {
                log::info!(
                    "Initializing vector store with {} dimensions (provider: {})",
                    embedder.dimensions(),
                    embedder.provider_name().unwrap_or("hashing")
                );
                Arc::new(VectorStore::new(embedder))
            })
            .clone()
    }
}
