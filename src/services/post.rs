//! Post service
//!
//! Implements business logic for posts:
//! - Create, update and delete with author/staff authorization
//! - Storing the main image and gallery uploads, and removing files that a
//!   write leaves orphaned
//! - Public listings (filters, sort, pagination), category, tag and
//!   profile pages
//! - Detail pages, where unpublished posts are only visible to those who
//!   may edit them

use crate::db::repositories::{CategoryRepository, PostQuery, PostRepository};
use crate::models::{
    resolve_page, CreatePostInput, ImageChange, ListParams, NewGalleryImage, PagedResult, Post,
    PostCard, PostDetail, PostFilter, PostListQuery, UpdatePostInput, User, POSTS_PER_PAGE,
};
use crate::services::media::{MediaStore, UploadedFile, GALLERY_DIR, POST_IMAGE_DIR};
use crate::services::tag::{normalize_tags, TagService};
use anyhow::Context;
use std::sync::Arc;

/// How many recent posts the category page shows beside its listing
pub const LATEST_POSTS_LIMIT: u32 = 5;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found, or not visible to the viewer
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// The user may not perform this action
    #[error("Permission denied")]
    Forbidden,

    /// The selected category does not exist
    #[error("Category not found: {0}")]
    InvalidCategory(i64),

    /// Main image rejected
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A validated post form
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub title: String,
    /// HTML body
    pub content: String,
    pub category_id: Option<i64>,
    pub published: bool,
    /// Raw comma-separated tag text
    pub tags: String,
    pub image: Option<UploadedFile>,
    /// Drop the current main image (ignored when a new one is uploaded)
    pub remove_image: bool,
    /// Gallery uploads; only images are kept
    pub gallery: Vec<UploadedFile>,
}

/// One page of the public listing together with the filter that produced it
#[derive(Debug, Clone)]
pub struct PostListing {
    pub page: PagedResult<PostCard>,
    pub filter: PostFilter,
}

/// Files written for a submission, removed again if the write fails
#[derive(Default)]
struct StoredUploads {
    image: Option<String>,
    gallery: Vec<NewGalleryImage>,
}

impl StoredUploads {
    fn paths(&self) -> Vec<String> {
        self.image
            .iter()
            .cloned()
            .chain(self.gallery.iter().map(|g| g.image.clone()))
            .collect()
    }
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<TagService>,
    media: Arc<MediaStore>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<TagService>,
        media: Arc<MediaStore>,
    ) -> Self {
        Self {
            repo,
            categories,
            tags,
            media,
        }
    }

    /// Create a post. Only staff may create posts.
    pub async fn create(&self, author: &User, form: PostSubmission) -> Result<Post, PostServiceError> {
        if !author.is_staff {
            tracing::warn!(user = %author.username, "Non-staff user tried to create a post");
            return Err(PostServiceError::Forbidden);
        }
        self.check_submission(&form).await?;

        let stored = self.store_uploads(&form).await?;
        let input = CreatePostInput {
            title: form.title,
            content: form.content,
            author_id: author.id,
            category_id: form.category_id,
            image: stored.image.clone(),
            published: form.published,
            tag_names: normalize_tags(&form.tags),
            gallery: stored.gallery.clone(),
        };

        match self.repo.create(&input).await {
            Ok(post) => {
                tracing::info!(post_id = post.id, user = %author.username, "Post created");
                self.tags.invalidate().await;
                Ok(post)
            }
            Err(e) => {
                self.media.remove_all(stored.paths()).await;
                Err(e.context("Failed to create post").into())
            }
        }
    }

    /// Update a post. The author and staff may edit it.
    pub async fn update(
        &self,
        id: i64,
        editor: &User,
        form: PostSubmission,
    ) -> Result<Post, PostServiceError> {
        let existing = self.editable(id, editor).await?;
        self.check_submission(&form).await?;

        let stored = self.store_uploads(&form).await?;
        let image = match (&stored.image, form.remove_image) {
            (Some(path), _) => ImageChange::Replace(path.clone()),
            (None, true) => ImageChange::Remove,
            (None, false) => ImageChange::Keep,
        };
        let input = UpdatePostInput {
            title: form.title,
            content: form.content,
            category_id: form.category_id,
            image: image.clone(),
            published: form.published,
            tag_names: normalize_tags(&form.tags),
            gallery: stored.gallery.clone(),
        };

        let updated = match self.repo.update(id, &input).await {
            Ok(Some(post)) => post,
            Ok(None) => {
                self.media.remove_all(stored.paths()).await;
                return Err(PostServiceError::NotFound(id));
            }
            Err(e) => {
                self.media.remove_all(stored.paths()).await;
                return Err(e.context("Failed to update post").into());
            }
        };

        if image != ImageChange::Keep {
            if let Some(old) = &existing.image {
                self.media.remove(old).await;
            }
        }
        tracing::info!(post_id = id, user = %editor.username, "Post updated");
        self.tags.invalidate().await;
        Ok(updated)
    }

    /// Delete a post together with its stored files
    pub async fn delete(&self, id: i64, editor: &User) -> Result<(), PostServiceError> {
        let post = self.editable(id, editor).await?;
        let gallery = self
            .repo
            .list_gallery(id)
            .await
            .context("Failed to load gallery")?;

        if !self.repo.delete(id).await.context("Failed to delete post")? {
            return Err(PostServiceError::NotFound(id));
        }

        self.media
            .remove_all(post.image.iter().cloned().chain(gallery.into_iter().map(|g| g.image)))
            .await;
        tracing::info!(post_id = id, user = %editor.username, "Post deleted");
        self.tags.invalidate().await;
        Ok(())
    }

    /// Load a post the user is allowed to edit
    pub async fn editable(&self, id: i64, editor: &User) -> Result<Post, PostServiceError> {
        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or(PostServiceError::NotFound(id))?;
        if !editor.can_edit(post.author_id) {
            tracing::warn!(post_id = id, user = %editor.username, "Edit permission denied");
            return Err(PostServiceError::Forbidden);
        }
        Ok(post)
    }

    /// Everything the detail and edit pages show except comments
    pub async fn get_detail(&self, id: i64, viewer: Option<&User>) -> Result<PostDetail, PostServiceError> {
        let card = self
            .repo
            .get_card(id)
            .await
            .context("Failed to load post")?
            .ok_or(PostServiceError::NotFound(id))?;

        let can_edit = viewer.is_some_and(|u| u.can_edit(card.post.author_id));
        if !card.post.published && !can_edit {
            return Err(PostServiceError::NotFound(id));
        }

        let tags = self.tags.for_post(id).await.map_err(anyhow::Error::from)?;
        let gallery = self
            .repo
            .list_gallery(id)
            .await
            .context("Failed to load gallery")?;
        Ok(PostDetail { card, tags, gallery })
    }

    /// The home page listing
    pub async fn list_public(&self, query: &PostListQuery) -> Result<PostListing, PostServiceError> {
        let filter = PostFilter::from_query(query);
        let page = self
            .paginate(&PostQuery::public(filter.clone()), query.page.as_deref())
            .await?;
        Ok(PostListing { page, filter })
    }

    /// Published posts of a category, newest first
    pub async fn category_page(
        &self,
        category_id: i64,
        page: Option<&str>,
    ) -> Result<PagedResult<PostCard>, PostServiceError> {
        self.paginate(&PostQuery::in_category(category_id), page).await
    }

    /// Published posts carrying a tag, newest first
    pub async fn tag_page(
        &self,
        tag_id: i64,
        page: Option<&str>,
    ) -> Result<PagedResult<PostCard>, PostServiceError> {
        self.paginate(&PostQuery::tagged(tag_id), page).await
    }

    /// Every post of an author, including unpublished ones
    pub async fn by_author(&self, author_id: i64) -> Result<Vec<PostCard>, PostServiceError> {
        Ok(self
            .repo
            .list(&PostQuery::by_author(author_id), None)
            .await
            .context("Failed to list author posts")?)
    }

    /// Most recent published posts
    pub async fn latest(&self, limit: u32) -> Result<Vec<PostCard>, PostServiceError> {
        let params = ListParams::new(1, limit);
        Ok(self
            .repo
            .list(&PostQuery::latest(), Some(&params))
            .await
            .context("Failed to list latest posts")?)
    }

    async fn paginate(
        &self,
        query: &PostQuery,
        requested: Option<&str>,
    ) -> Result<PagedResult<PostCard>, PostServiceError> {
        let total = self.repo.count(query).await.context("Failed to count posts")?;
        let page = resolve_page(requested, total, POSTS_PER_PAGE);
        let params = ListParams::new(page, POSTS_PER_PAGE);
        let items = self
            .repo
            .list(query, Some(&params))
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn check_submission(&self, form: &PostSubmission) -> Result<(), PostServiceError> {
        if let Some(id) = form.category_id {
            if self
                .categories
                .get_by_id(id)
                .await
                .context("Failed to load category")?
                .is_none()
            {
                return Err(PostServiceError::InvalidCategory(id));
            }
        }

        if let Some(image) = &form.image {
            let config = self.media.config();
            if !config.is_type_allowed(&image.content_type) {
                return Err(PostServiceError::InvalidImage(format!(
                    "Tipo de archivo no permitido: {}",
                    image.content_type
                )));
            }
            if image.data.len() as u64 > config.max_file_size {
                return Err(PostServiceError::InvalidImage(format!(
                    "La imagen supera el máximo de {} MB",
                    config.max_file_size / 1024 / 1024
                )));
            }
        }
        Ok(())
    }

    async fn store_uploads(&self, form: &PostSubmission) -> Result<StoredUploads, PostServiceError> {
        let mut stored = StoredUploads::default();
        let max_size = self.media.config().max_file_size;

        let result: anyhow::Result<()> = async {
            if let Some(image) = &form.image {
                stored.image = Some(self.media.save_upload(POST_IMAGE_DIR, image).await?);
            }
            let config = self.media.config();
            for file in &form.gallery {
                if !config.is_type_allowed(&file.content_type) || file.data.len() as u64 > max_size {
                    tracing::debug!(file = %file.file_name, "Skipping gallery upload");
                    continue;
                }
                let image = self.media.save_upload(GALLERY_DIR, file).await?;
                stored.gallery.push(NewGalleryImage {
                    image,
                    description: String::new(),
                });
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => Ok(stored),
            Err(e) => {
                self.media.remove_all(stored.paths()).await;
                Err(e.into())
            }
        }
    }
}
