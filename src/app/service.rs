use crate::{
    config::SearchConfig,
    highlights::{HighlightPage, NewHighlight, SearchResult},
    ingest,
    search,
    semantic::HighlightStore,
};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::AppError;

/// Score reported for listing entries, which carry no relevance.
const LISTING_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchRequest {
    pub prompt: String,

    /// Maximum number of results, all matches when absent
    #[serde(default)]
    pub limit: Option<usize>,

    /// Keep only highlights carrying at least one of these tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Highlight operations over one shared vector store.
pub struct HighlightService {
    store: RwLock<HighlightStore>,
    search: SearchConfig,
}

impl HighlightService {
    pub fn new(store: HighlightStore, search: SearchConfig) -> Self {
        Self {
            store: RwLock::new(store),
            search,
        }
    }

    /// Parse a CSV upload and store its highlights, returning how many were stored.
    pub fn import_csv(&self, filename: &str, data: &[u8]) -> Result<usize, AppError> {
        ingest::ensure_csv_filename(filename)?;
        let rows = ingest::parse_highlights(data)?;
        self.store_highlights(rows)
    }

    pub fn store_highlights(&self, rows: Vec<NewHighlight>) -> Result<usize, AppError> {
        if rows.is_empty() {
            log::info!("no highlights to store");
            return Ok(0);
        }

        let metadatas = rows.iter().map(NewHighlight::metadata).collect();
        let texts: Vec<String> = rows.into_iter().map(|row| row.content).collect();

        // embedding runs outside the store lock
        let embedder = self.read_store()?.embedder();
        let embeddings = HighlightStore::embed_documents(embedder.as_ref(), &texts)?;

        let mut store = self.write_store()?;
        let ids = store.add_embedded(texts, metadatas, embeddings)?;

        log::info!(
            "stored {} highlights in '{}'",
            ids.len(),
            store.collection()
        );

        Ok(ids.len())
    }

    /// Semantic search with optional tag filter and limit.
    pub fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>, AppError> {
        if request.prompt.trim().is_empty() {
            return Err(AppError::EmptyPrompt);
        }

        let tags = request.tags.filter(|tags| !tags.is_empty());

        let store = self.read_store()?;
        let total = store.count();
        let k = search::fetch_count(request.limit, total, tags.is_some(), &self.search);

        log::debug!(
            "search: limit={:?} tags={:?} total={total} k={k}",
            request.limit,
            tags
        );

        let hits = store.similarity_search_with_score(&request.prompt, k)?;
        let results = search::rank(hits, request.limit, tags.as_deref());

        if results.is_empty() {
            return Err(AppError::NotFound);
        }

        Ok(results)
    }

    /// Page through every stored highlight in insertion order.
    pub fn list(&self, skip: usize, limit: usize) -> Result<HighlightPage, AppError> {
        let all = self.read_store()?.get_all();
        let total = all.len();

        let highlights = all
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| SearchResult::from_stored(doc, LISTING_SCORE))
            .collect();

        Ok(HighlightPage {
            highlights,
            total,
            skip,
            limit,
        })
    }

    pub fn count(&self) -> Result<usize, AppError> {
        Ok(self.read_store()?.count())
    }

    /// Delete every highlight. The store stays ready for new uploads.
    pub fn clear(&self) -> Result<(), AppError> {
        self.write_store()?.delete_collection()?;
        Ok(())
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, HighlightStore>, AppError> {
        self.store
            .read()
            .map_err(|e| AppError::Other(anyhow!("store lock poisoned: {e}")))
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, HighlightStore>, AppError> {
        self.store
            .write()
            .map_err(|e| AppError::Other(anyhow!("store lock poisoned: {e}")))
    }
}
