//! Indexing and search service over a shared vector store.
//!
//! This is the surface the request-handling layer talks to:
//! - `index`: chunk a text, embed every chunk, upsert the chunks
//! - `search`: validate the query and return ranked hits
//!
//! Input problems are reported as [`VaultError::InvalidInput`]; embedding
//! provider failures never reach this layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::eid::Eid;
use crate::vault::chunker::{self, DEFAULT_CHUNK_LEN};
use crate::vault::index::{Hit, IndexedItem, VectorStore};
use crate::vault::metadata::{Metadata, MetadataValue, CHUNK_KEY, DOCUMENT_ID_KEY, TITLE_KEY};
use crate::vault::seed::Document;

/// Errors reported to callers of the vault service.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid input: {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Failed to read documents from {path:?}")]
    ReadDocuments {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON documents in {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed YAML documents in {path:?}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

impl VaultError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        VaultError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        VaultError::ReadDocuments {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        VaultError::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn yaml(path: &Path, source: serde_yml::Error) -> Self {
        VaultError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of indexing one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReceipt {
    /// Shared prefix of the chunk ids (`{id_prefix}_{chunk}`)
    pub id_prefix: String,
    pub chunk_count: usize,
}

/// Vault service bound to one store.
#[derive(Debug, Clone)]
pub struct VaultService {
    store: Arc<VectorStore>,
    chunk_len: usize,
}

impl VaultService {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            chunk_len: DEFAULT_CHUNK_LEN,
        }
    }

    /// Set the maximum chunk length in characters.
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Number of chunks currently held by the store.
    pub fn vault_size(&self) -> usize {
        self.store.len()
    }

    /// Chunk, embed and upsert a text.
    ///
    /// Every chunk gets the caller's metadata plus `chunk` (0-based position)
    /// and `document_id` (the returned id prefix).
    pub fn index(&self, text: &str, metadata: Metadata) -> Result<IndexReceipt, VaultError> {
        let chunks = chunker::chunk(text, self.chunk_len);
        if chunks.is_empty() {
            return Err(VaultError::invalid_input("text", "text is required"));
        }

        let id_prefix = Eid::new().to_string();
        let chunk_count = chunks.len();
        let _span = tracing::debug_span!("vault.index", %id_prefix, chunk_count).entered();

        // embeddings are computed before any store lock is taken
        let vectors = self.store.embedder().embed_batch(&chunks);

        let items: Vec<IndexedItem> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (contents, vector))| {
                let mut metadata = metadata.clone();
                metadata.insert(CHUNK_KEY.to_string(), MetadataValue::from(i));
                metadata.insert(
                    DOCUMENT_ID_KEY.to_string(),
                    MetadataValue::from(id_prefix.as_str()),
                );
                IndexedItem {
                    id: format!("{id_prefix}_{i}"),
                    vector,
                    contents,
                    metadata,
                }
            })
            .collect();

        let summary = self.store.upsert(items);
        log::debug!(
            "indexed id_prefix={id_prefix} chunks={chunk_count} inserted={} replaced={}",
            summary.inserted,
            summary.replaced
        );

        Ok(IndexReceipt {
            id_prefix,
            chunk_count,
        })
    }

    /// Index a titled document. The title is stored under `title`.
    pub fn index_document(&self, document: &Document) -> Result<IndexReceipt, VaultError> {
        let mut metadata = document.metadata.clone();
        if let Some(title) = &document.title {
            metadata.insert(TITLE_KEY.to_string(), MetadataValue::from(title.as_str()));
        }
        self.index(&document.text, metadata)
    }

    /// Search the store.
    ///
    /// `top_k` of zero is treated as one. `filters` keeps only items whose
    /// metadata holds every given key with an equal value.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<Hit>, VaultError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VaultError::invalid_input("query", "query is required"));
        }

        let _span = tracing::debug_span!("vault.search", top_k).entered();
        let filters = filters.filter(|f| !f.is_empty());
        let hits = self.store.query(query, top_k, filters);
        log::debug!("search returned {} hits", hits.len());

        Ok(hits)
    }
}
