//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity.
///
/// `name` keeps the casing of the first post that used it; lookups go
/// through [`tag_key`] so that case variants resolve to one row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Case-folded identity of a tag name, stored in the unique `name_key` column
pub fn tag_key(name: &str) -> String {
    name.to_lowercase()
}

/// Tag with post count, used for the featured tag list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    /// Number of published posts carrying this tag
    pub post_count: i64,
}

impl TagWithCount {
    pub fn new(tag: Tag, post_count: i64) -> Self {
        Self { tag, post_count }
    }
}
