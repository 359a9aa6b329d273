use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding the book title.
pub const META_BOOK_TITLE: &str = "book_title";
/// Metadata key holding the book author.
pub const META_BOOK_AUTHOR: &str = "book_author";
/// Metadata key holding the comma-joined tag list.
pub const META_TAGS: &str = "tags";

/// Fallback shown when a stored document has no title or author key.
const UNKNOWN: &str = "Unknown";

/// Free-form metadata attached to a stored document.
pub type Metadata = BTreeMap<String, String>;

/// A highlight row ready to be embedded and stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHighlight {
    pub content: String,
    pub book_title: String,
    pub book_author: String,
    pub tags: Vec<String>,
}

impl NewHighlight {
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            (META_BOOK_TITLE.to_string(), self.book_title.clone()),
            (META_BOOK_AUTHOR.to_string(), self.book_author.clone()),
            (META_TAGS.to_string(), join_tags(&self.tags)),
        ])
    }
}

/// A document as held by the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHighlight {
    pub id: u64,
    pub content: String,
    pub metadata: Metadata,
}

/// Search hit or listing entry returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub book_title: String,
    pub book_author: String,
    pub tags: Vec<String>,
    pub score: f64,
}

impl SearchResult {
    pub fn from_stored(doc: StoredHighlight, score: f64) -> Self {
        let tags = doc.tags();
        let StoredHighlight {
            content,
            mut metadata,
            ..
        } = doc;

        SearchResult {
            content,
            book_title: metadata
                .remove(META_BOOK_TITLE)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            book_author: metadata
                .remove(META_BOOK_AUTHOR)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            tags,
            score,
        }
    }
}

impl StoredHighlight {
    pub fn tags(&self) -> Vec<String> {
        self.metadata
            .get(META_TAGS)
            .map(|tags| parse_tags(tags))
            .unwrap_or_default()
    }
}

/// One page of the full listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightPage {
    pub highlights: Vec<SearchResult>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

/// Split a comma-separated tag string, trimming entries and dropping blanks.
///
/// Case and order are preserved, duplicates are kept.
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`parse_tags`] for tags that are already trimmed.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}
