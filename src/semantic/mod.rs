//! Vector search infrastructure for highlights.
//!
//! # Architecture
//!
//! - `embeddings`: the `Embedder` seam and the local fastembed provider
//! - `openai`: OpenAI-compatible embeddings client
//! - `index`: In-memory vector index with cosine distance search
//! - `storage`: Binary file I/O for the collection file
//! - `store`: One persisted collection (embed, insert, query, delete)

pub mod embeddings;
mod index;
mod openai;
mod storage;
mod store;

pub use embeddings::{Embedder, LocalEmbedder};
pub use openai::OpenAiEmbedder;
pub use store::{HighlightStore, StoreError};
