//! Ranking of nearest-neighbour hits into search results.
//!
//! The store returns `(document, distance)` pairs by ascending distance. This
//! module decides how many candidates to ask for, converts distances into
//! similarity scores, applies the tag filter and cuts the list at the limit.

use crate::{
    config::SearchConfig,
    highlights::{SearchResult, StoredHighlight},
};

/// Number of nearest neighbours to request from the store.
///
/// Without a limit (`None` or `Some(0)`), or with a limit covering the whole
/// collection, everything is requested (`fallback_fetch` when the store
/// reports no items). A tag
/// filter multiplies the limit by `tag_overfetch_factor` to make up for hits
/// dropped by the filter. This is best effort: no second query is issued when
/// the filter leaves fewer than `limit` results.
pub fn fetch_count(
    limit: Option<usize>,
    total: usize,
    filtering: bool,
    config: &SearchConfig,
) -> usize {
    let k = match limit.filter(|limit| *limit > 0) {
        Some(limit) if limit < total => {
            if filtering {
                limit.saturating_mul(config.tag_overfetch_factor)
            } else {
                limit
            }
        }
        _ if total > 0 => total,
        _ => config.fallback_fetch,
    };

    if total > 0 {
        k.min(total)
    } else {
        k
    }
}

/// Map a store distance to a similarity score in `[0, 1]`, rounded to four
/// decimals. Distances of 1 or more saturate to 0.
pub fn similarity(distance: f32) -> f64 {
    let score = 1.0 - f64::from(distance).abs().min(1.0);
    (score * 10_000.0).round() / 10_000.0
}

/// True when any filter tag equals any stored tag, ignoring case.
pub fn matches_tags(filter: &[String], tags: &[String]) -> bool {
    filter
        .iter()
        .any(|wanted| tags.iter().any(|tag| tag.to_lowercase() == wanted.to_lowercase()))
}

/// Turn ordered hits into results, keeping the store's order.
///
/// `limit` of `None` or `Some(0)` keeps every surviving hit.
pub fn rank(
    hits: Vec<(StoredHighlight, f32)>,
    limit: Option<usize>,
    tags: Option<&[String]>,
) -> Vec<SearchResult> {
    let limit = limit.filter(|limit| *limit > 0);
    let mut results = vec![];

    for (doc, distance) in hits {
        if let Some(filter) = tags {
            if !matches_tags(filter, &doc.tags()) {
                continue;
            }
        }

        results.push(SearchResult::from_stored(doc, similarity(distance)));

        if limit.is_some_and(|limit| results.len() >= limit) {
            break;
        }
    }

    results
}
