//! File-backed vector collection.
//!
//! Ties together the embedder, the in-memory index and the on-disk storage:
//! - writes embed the documents first, then insert them and persist the
//!   whole collection
//! - queries embed the prompt and return nearest documents with distances

use std::path::Path;
use std::sync::Arc;

use crate::highlights::{Metadata, StoredHighlight};
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{IndexError, VectorIndex};
use crate::semantic::storage::{VectorStorage, VectorStorageError};

/// Errors that can occur during vector store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("Got {texts} texts but {metadatas} metadata entries")]
    LengthMismatch { texts: usize, metadatas: usize },

    #[error("Embedder returned {got} vectors for {expected} texts")]
    MissingEmbeddings { expected: usize, got: usize },
}

/// One named collection of documents and their embeddings.
pub struct HighlightStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    model_id: [u8; 32],
    index: VectorIndex,
    storage: VectorStorage,
}

impl HighlightStore {
    /// Open `<dir>/<collection>.bin`, starting empty if it does not exist.
    pub fn open(
        dir: &Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(VectorStorageError::from)?;

        let model_id = embedder.model_id_hash();
        let storage = VectorStorage::new(dir.join(format!("{collection}.bin")));

        let index = if storage.exists() {
            match storage.load(&model_id) {
                Ok(index) => {
                    log::info!(
                        "Loaded {} vectors for collection '{collection}' from {}",
                        index.len(),
                        storage.path().display()
                    );
                    index
                }
                Err(VectorStorageError::ModelMismatch) => {
                    log::error!(
                        "Collection '{collection}' was built with a different model than '{}'",
                        embedder.name()
                    );
                    return Err(VectorStorageError::ModelMismatch.into());
                }
                Err(e) => {
                    log::error!("Failed to load vectors: {}", e);
                    return Err(e.into());
                }
            }
        } else {
            log::info!("No existing collection '{collection}', starting fresh");
            VectorIndex::new(0)
        };

        Ok(Self {
            collection: collection.to_string(),
            embedder,
            model_id,
            index,
            storage,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embedder the collection was opened with.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Embed documents with `embedder`, one vector per text.
    ///
    /// Needs no access to the collection, so callers can run it without
    /// holding the store.
    pub fn embed_documents(
        embedder: &dyn Embedder,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let embeddings = embedder.embed_documents(texts)?;
        if embeddings.len() != texts.len() {
            return Err(StoreError::MissingEmbeddings {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }
        Ok(embeddings)
    }

    /// Store already embedded documents, returning their ids.
    ///
    /// Nothing is stored when any vector fails to insert or the collection
    /// cannot be persisted.
    pub fn add_embedded(
        &mut self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<u64>, StoreError> {
        if texts.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if embeddings.len() != texts.len() {
            return Err(StoreError::MissingEmbeddings {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // stage into a copy so a bad vector leaves the collection untouched
        let mut staged = VectorIndex::new(self.index.dimensions());
        staged.reserve_ids_until(self.index.next_id());
        let mut ids = Vec::with_capacity(texts.len());
        for ((content, metadata), embedding) in texts.into_iter().zip(metadatas).zip(embeddings) {
            ids.push(staged.push(content, metadata, embedding)?);
        }

        for (id, entry) in staged.iter() {
            self.index.insert_with_id(id, entry.clone())?;
        }

        if let Err(e) = self.persist() {
            log::error!("Failed to persist collection '{}': {}", self.collection, e);
            for id in &ids {
                self.index.remove(*id);
            }
            return Err(e);
        }

        log::debug!(
            "stored {} documents in '{}' ({} total)",
            ids.len(),
            self.collection,
            self.index.len()
        );

        Ok(ids)
    }

    /// The `k` documents nearest to `query` with their cosine distances,
    /// closest first. An empty collection answers without embedding.
    pub fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(StoredHighlight, f32)>, StoreError> {
        if self.index.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let query_embedding = self.embedder.embed_query(query)?;
        let neighbors = self.index.nearest(&query_embedding, k)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|n| self.index.document(n.id).map(|doc| (doc, n.distance)))
            .collect())
    }

    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Every document in insertion order.
    pub fn get_all(&self) -> Vec<StoredHighlight> {
        self.index.documents()
    }

    /// Remove the collection from disk and memory.
    pub fn delete_collection(&mut self) -> Result<(), StoreError> {
        self.storage.delete()?;
        self.index.clear();
        log::info!("Deleted collection '{}'", self.collection);
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.storage.save(&self.index, &self.model_id)?;
        Ok(())
    }
}
