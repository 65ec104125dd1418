//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput, User};
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Post not found, or not visible to the commenter
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { repo, posts }
    }

    /// Add a comment by `author` to a post they can see
    pub async fn add(
        &self,
        post_id: i64,
        author: &User,
        content: &str,
    ) -> Result<Comment, CommentServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "El comentario no puede estar vacío.".to_string(),
            ));
        }

        let post = self
            .posts
            .get_by_id(post_id)
            .await?
            .ok_or(CommentServiceError::PostNotFound(post_id))?;
        if !post.published && !author.can_edit(post.author_id) {
            return Err(CommentServiceError::PostNotFound(post_id));
        }

        let comment = self
            .repo
            .create(&CreateCommentInput {
                post_id,
                author_id: author.id,
                content: content.to_string(),
            })
            .await?;
        tracing::info!(post_id, comment_id = comment.id, user = %author.username, "Comment added");
        Ok(comment)
    }

    /// Comments of a post, newest first
    pub async fn list_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        Ok(self.repo.list_for_post(post_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreatePostInput;

    struct Fixture {
        service: CommentService,
        posts: Arc<dyn PostRepository>,
        staff: User,
        reader: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let staff = users
            .create(&User::new("ana".into(), "ana@example.com".into(), "h".into(), true))
            .await
            .expect("create staff");
        let reader = users
            .create(&User::new("beto".into(), "beto@example.com".into(), "h".into(), false))
            .await
            .expect("create reader");

        let posts = SqlxPostRepository::boxed(pool.clone());
        let service = CommentService::new(SqlxCommentRepository::boxed(pool), posts.clone());
        Fixture {
            service,
            posts,
            staff,
            reader,
        }
    }

    async fn post(fixture: &Fixture, published: bool) -> i64 {
        fixture
            .posts
            .create(&CreatePostInput {
                title: "Reseña".to_string(),
                content: "<p>texto</p>".to_string(),
                author_id: fixture.staff.id,
                category_id: None,
                image: None,
                published,
                tag_names: vec![],
                gallery: vec![],
            })
            .await
            .expect("create post")
            .id
    }

    #[tokio::test]
    async fn test_add_and_list_newest_first() {
        let fixture = setup().await;
        let post_id = post(&fixture, true).await;

        fixture
            .service
            .add(post_id, &fixture.reader, "  primero  ")
            .await
            .expect("add");
        fixture
            .service
            .add(post_id, &fixture.staff, "segundo")
            .await
            .expect("add");

        let comments = fixture.service.list_for_post(post_id).await.expect("list");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment.content, "segundo");
        assert_eq!(comments[1].comment.content, "primero");
        assert_eq!(comments[1].author_username, "beto");
    }

    #[tokio::test]
    async fn test_blank_comment_rejected() {
        let fixture = setup().await;
        let post_id = post(&fixture, true).await;
        assert!(matches!(
            fixture.service.add(post_id, &fixture.reader, " \n ").await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unpublished_post_hidden_from_readers() {
        let fixture = setup().await;
        let post_id = post(&fixture, false).await;

        assert!(matches!(
            fixture.service.add(post_id, &fixture.reader, "hola").await,
            Err(CommentServiceError::PostNotFound(_))
        ));
        fixture
            .service
            .add(post_id, &fixture.staff, "nota interna")
            .await
            .expect("staff may comment");
        assert!(matches!(
            fixture.service.add(9999, &fixture.staff, "hola").await,
            Err(CommentServiceError::PostNotFound(9999))
        ));
    }
}
