//! In-memory vector index with cosine distance search.
//!
//! Holds every stored highlight with its embedding, keyed by an id the index
//! assigns. Ids increase monotonically so iteration follows insertion order.

use std::collections::BTreeMap;

use crate::highlights::{Metadata, StoredHighlight};

/// An entry in the vector index.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// The embedded text
    pub content: String,
    pub metadata: Metadata,
    /// The embedding vector
    pub embedding: Vec<f32>,
}

impl VectorEntry {
    fn to_document(&self, id: u64) -> StoredHighlight {
        StoredHighlight {
            id,
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// In-memory vector index for semantic search.
///
/// Dimensions are fixed by the first inserted vector when created with 0.
pub struct VectorIndex {
    entries: BTreeMap<u64, VectorEntry>,
    dimensions: usize,
    next_id: u64,
}

/// Nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    /// Cosine distance (0.0 to 2.0)
    pub distance: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Id {0} is already taken")]
    DuplicateId(u64),
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            dimensions,
            next_id: 0,
        }
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id the next insert will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Insert a new entry and return its id.
    pub fn push(
        &mut self,
        content: String,
        metadata: Metadata,
        embedding: Vec<f32>,
    ) -> Result<u64, IndexError> {
        let id = self.next_id;
        self.insert_with_id(
            id,
            VectorEntry {
                content,
                metadata,
                embedding,
            },
        )?;
        Ok(id)
    }

    /// Insert an entry under a known id (used when loading from storage).
    pub fn insert_with_id(&mut self, id: u64, entry: VectorEntry) -> Result<(), IndexError> {
        self.check_vector(&entry.embedding)?;

        if self.entries.contains_key(&id) {
            return Err(IndexError::DuplicateId(id));
        }

        if self.dimensions == 0 {
            self.dimensions = entry.embedding.len();
        }

        self.entries.insert(id, entry);
        self.next_id = self.next_id.max(id + 1);

        Ok(())
    }

    /// Advance the id counter, never moving it backwards.
    pub fn reserve_ids_until(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Remove an entry by id. Ids are not reused.
    pub fn remove(&mut self, id: u64) -> Option<VectorEntry> {
        self.entries.remove(&id)
    }

    /// Get an entry by id.
    pub fn get(&self, id: u64) -> Option<&VectorEntry> {
        self.entries.get(&id)
    }

    /// Iterate over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &VectorEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> Vec<StoredHighlight> {
        self.iter().map(|(id, entry)| entry.to_document(id)).collect()
    }

    /// Document view of a single entry.
    pub fn document(&self, id: u64) -> Option<StoredHighlight> {
        self.get(id).map(|entry| entry.to_document(id))
    }

    /// Find the `k` nearest entries by cosine distance.
    ///
    /// Results are sorted by ascending distance; ties keep insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        self.check_vector(query)?;
        let query_norm = Self::l2_norm(query);

        let mut results: Vec<Neighbor> = self
            .entries
            .iter()
            .map(|(id, entry)| Neighbor {
                id: *id,
                distance: 1.0 - Self::cosine_similarity(query, &entry.embedding, query_norm),
            })
            .collect();

        // stable sort keeps id order among equal distances
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    /// Drop all entries and forget the dimensions.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dimensions = 0;
        self.next_id = 0;
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if self.dimensions != 0 && vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        if Self::l2_norm(vector) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        Ok(())
    }

    /// Compute L2 norm of a vector.
    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Compute cosine similarity between two vectors.
    /// Assumes query_norm is precomputed for efficiency.
    fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
        let target_norm = Self::l2_norm(target);
        if target_norm < f32::EPSILON {
            return 0.0;
        }

        let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
        dot_product / (query_norm * target_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(index: &mut VectorIndex, content: &str, embedding: Vec<f32>) -> u64 {
        index
            .push(content.to_string(), Metadata::new(), embedding)
            .unwrap()
    }

    #[test]
    fn test_new_index() {
        let index = VectorIndex::new(384);
        assert_eq!(index.dimensions(), 384);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_dimensions_adopted_from_first_insert() {
        let mut index = VectorIndex::new(0);
        push(&mut index, "a", vec![1.0, 0.0, 0.0]);
        assert_eq!(index.dimensions(), 3);

        let result = index.push("b".into(), Metadata::new(), vec![1.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { expected: 3, got: 2 })));
    }

    #[test]
    fn test_push_assigns_increasing_ids() {
        let mut index = VectorIndex::new(3);
        let a = push(&mut index, "a", vec![1.0, 0.0, 0.0]);
        let b = push(&mut index, "b", vec![0.0, 1.0, 0.0]);

        assert_eq!((a, b), (0, 1));
        assert_eq!(index.next_id(), 2);

        let entry = index.get(b).unwrap();
        assert_eq!(entry.content, "b");
        assert_eq!(entry.embedding, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_insert_zero_norm_rejected() {
        let mut index = VectorIndex::new(3);
        let result = index.push("zero".into(), Metadata::new(), vec![0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut index = VectorIndex::new(2);
        let entry = VectorEntry {
            content: "x".into(),
            metadata: Metadata::new(),
            embedding: vec![1.0, 0.0],
        };
        index.insert_with_id(5, entry.clone()).unwrap();
        assert_eq!(index.next_id(), 6);
        assert!(matches!(
            index.insert_with_id(5, entry),
            Err(IndexError::DuplicateId(5))
        ));
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let mut index = VectorIndex::new(3);
        push(&mut index, "x", vec![1.0, 0.0, 0.0]);
        push(&mut index, "y", vec![0.0, 1.0, 0.0]);
        push(&mut index, "-x", vec![-1.0, 0.0, 0.0]);

        let results = index.nearest(&[1.0, 0.1, 0.0], 10).unwrap();
        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        assert!(results[0].distance < 0.01);
        assert!((results[1].distance - 0.9).abs() < 0.01);
        assert!((results[2].distance - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_nearest_respects_k_and_ties() {
        let mut index = VectorIndex::new(2);
        for i in 0..5 {
            push(&mut index, &format!("same {i}"), vec![1.0, 1.0]);
        }

        let results = index.nearest(&[1.0, 1.0], 3).unwrap();
        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_nearest_on_empty_index_skips_validation() {
        let index = VectorIndex::new(0);
        assert!(index.nearest(&[0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        push(&mut index, "a", vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            index.nearest(&[1.0, 0.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_documents_in_insertion_order() {
        let mut index = VectorIndex::new(2);
        for name in ["first", "second", "third"] {
            push(&mut index, name, vec![1.0, 0.5]);
        }

        let contents: Vec<String> = index.documents().into_iter().map(|d| d.content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_clear() {
        let mut index = VectorIndex::new(0);
        push(&mut index, "a", vec![1.0, 0.0]);
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 0);
        assert_eq!(index.next_id(), 0);
    }
}
