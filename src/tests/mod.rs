use std::sync::{mpsc, Arc, Mutex};

use crate::app::HighlightService;
use crate::config::SearchConfig;
use crate::semantic::embeddings::EmbeddingError;
use crate::semantic::{Embedder, HighlightStore};

mod web;

const WORD_DIMENSIONS: usize = 32;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
///
/// Dimension 0 is a constant so no text ever maps to a zero vector.
pub struct WordEmbedder;

impl WordEmbedder {
    fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; WORD_DIMENSIONS + 1];
        vector[0] = 0.5;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let hash = crc32fast::hash(word.to_lowercase().as_bytes()) as usize;
            vector[1 + hash % WORD_DIMENSIONS] += 1.0;
        }

        vector
    }
}

impl Embedder for WordEmbedder {
    fn name(&self) -> &str {
        "test:words"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "test:failing"
    }

    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed(
            "embedding service unavailable".to_string(),
        ))
    }
}

/// [`WordEmbedder`] that reports each call on `started` and then waits for
/// a message on `release` before answering.
pub struct GatedEmbedder {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedEmbedder {
    pub fn new(started: mpsc::Sender<()>, release: mpsc::Receiver<()>) -> Self {
        Self {
            started: Mutex::new(started),
            release: Mutex::new(release),
        }
    }
}

impl Embedder for GatedEmbedder {
    fn name(&self) -> &str {
        "test:words"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let _ = self.started.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        WordEmbedder.embed_documents(texts)
    }
}

/// Service over a fresh store in its own temp directory.
pub fn create_service(embedder: Arc<dyn Embedder>) -> (HighlightService, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store = HighlightStore::open(tmp.path(), "highlights", embedder)
        .expect("failed to open store");

    (HighlightService::new(store, SearchConfig::default()), tmp)
}

pub const SAMPLE_CSV: &str = "\
Highlight,Book Title,Book Author,Tags
The obstacle is the way,Meditations,Marcus Aurelius,\"stoicism, philosophy\"
Waste no more time arguing about what a good man should be,Meditations,Marcus Aurelius,stoicism
Choose a job you love and you will never work a day,Notes,Unknown Author,\"work, passion\"
Bread needs time and patience to rise,Flour Water Salt Yeast,Ken Forkish,baking
";
