//! Embedding and in-memory vector index for clinical documents.
//!
//! # Architecture
//!
//! - `embeddings`: deterministic hashing embedder with optional provider
//! - `providers`: HTTP and local-model embedding providers
//! - `chunker`: bounded-length text chunking
//! - `metadata`: typed metadata values and filter matching
//! - `index`: the shared vector store (upsert, filtered top-k query)
//! - `lifecycle`: lazy single construction of the store
//! - `service`: index/search entry points used by callers
//! - `seed`: document loading and the curated demo corpus
//! - `context`: grounded prompt assembly from hits

pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod index;
pub mod lifecycle;
pub mod metadata;
pub mod providers;
pub mod seed;
pub mod service;

pub use embeddings::{Embedder, DEFAULT_DIMENSIONS};
pub use index::DEFAULT_TOP_K;
pub use lifecycle::IndexCell;
pub use metadata::{Metadata, MetadataValue};
pub use service::VaultService;
