//! Tag service
//!
//! Turns free-text tag input into canonical names and serves tag lookups.
//!
//! Normalization rules, applied to each comma-separated piece:
//! - surrounding whitespace is trimmed and empty pieces are dropped
//! - inner whitespace runs collapse to a single space
//! - letters are title-cased: upper-case after a non-letter, lower-case
//!   after a letter, so `co-op` becomes `Co-Op`
//! - pieces with characters other than letters, digits, space, `-` and `#`
//!   are dropped, as are pieces longer than [`MAX_TAG_LENGTH`] characters
//!
//! Order is preserved and repeats are kept; the resolver collapses them.

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use std::sync::Arc;

/// Column limit of `tags.name`
pub const MAX_TAG_LENGTH: usize = 50;

/// How many tags the home page sidebar shows
pub const FEATURED_TAG_LIMIT: i64 = 10;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Parse a comma-separated tag string into canonical tag names
pub fn normalize_tags(raw: &str) -> Vec<String> {
    raw.split(',').filter_map(normalize_tag).collect()
}

/// Canonical form of a single tag, or `None` if it is not acceptable
pub fn normalize_tag(piece: &str) -> Option<String> {
    let words: Vec<&str> = piece.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let name = title_case(&words.join(" "));

    let allowed = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '#');
    if !allowed || name.chars().count() > MAX_TAG_LENGTH {
        return None;
    }
    Some(name)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_lowercase() || c.is_uppercase();
    }
    out
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: SharedCache,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Look up a tag by name, ignoring letter case
    pub async fn get_by_name(&self, name: &str) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_name(name)
            .await?
            .ok_or_else(|| TagServiceError::NotFound(name.to_string()))
    }

    /// Tags of a post
    pub async fn for_post(&self, post_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list_for_post(post_id).await?)
    }

    /// Most used tags for the sidebar, cached until the next tag write
    pub async fn featured(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        let repo = self.repo.clone();
        self.cache
            .get_or_load(keys::FEATURED_TAGS, || async move {
                repo.featured(FEATURED_TAG_LIMIT)
                    .await
                    .map_err(TagServiceError::from)
            })
            .await
    }

    /// Drop cached tag data after posts or tags change
    pub async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(keys::TAGS_PATTERN).await {
            tracing::warn!(error = %e, "Failed to invalidate tag cache");
        }
    }
}
