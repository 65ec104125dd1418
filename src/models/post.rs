//! Post model
//!
//! This module provides:
//! - `Post` entity and the `PostCard` listing view
//! - `GalleryImage` entity owned by a post
//! - Input types for creating and updating posts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tag;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title (max 200 characters)
    pub title: String,
    /// HTML body produced by the rich-text editor
    pub content: String,
    /// Author user ID
    pub author_id: i64,
    /// Creation timestamp, never changed after insert
    pub created_at: DateTime<Utc>,
    /// Main image path relative to the media root
    pub image: Option<String>,
    /// Category ID, cleared when the category is deleted
    pub category_id: Option<i64>,
    /// Unpublished posts are hidden from every public listing
    pub published: bool,
}

/// A post joined with the data list pages display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category_name: Option<String>,
    pub comment_count: i64,
}

/// A post with everything its detail page shows except comments
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub card: PostCard,
    pub tags: Vec<Tag>,
    pub gallery: Vec<GalleryImage>,
}

impl PostDetail {
    /// Tag names joined the way the edit form expects them
    pub fn tags_text(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Gallery image attached to a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryImage {
    pub id: i64,
    pub post_id: i64,
    /// Image path relative to the media root
    pub image: String,
    pub description: String,
}

/// A gallery image that has been stored but not yet recorded
#[derive(Debug, Clone)]
pub struct NewGalleryImage {
    pub image: String,
    pub description: String,
}

/// What to do with a post's main image on update
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageChange {
    #[default]
    Keep,
    Replace(String),
    Remove,
}

/// Input for creating a new post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub image: Option<String>,
    pub published: bool,
    /// Normalized tag names, possibly with case-insensitive repeats
    pub tag_names: Vec<String>,
    pub gallery: Vec<NewGalleryImage>,
}

/// Input for updating a post. The tag set is always fully replaced;
/// gallery images are appended.
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub image: ImageChange,
    pub published: bool,
    pub tag_names: Vec<String>,
    pub gallery: Vec<NewGalleryImage>,
}
