//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments of a post, newest first
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;
}

/// Comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite_pool(&self.pool)?, input).await,
            DatabaseDriver::Mysql => create_mysql(mysql_pool(&self.pool)?, input).await,
        }
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_for_post_sqlite(sqlite_pool(&self.pool)?, post_id).await,
            DatabaseDriver::Mysql => list_for_post_mysql(mysql_pool(&self.pool)?, post_id).await,
        }
    }
}

const LIST_FOR_POST_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author_id, c.content, c.created_at, u.username AS author_username
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.created_at DESC, c.id DESC
"#;

// SQLite

async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.author_id)
    .bind(&input.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: input.post_id,
        author_id: input.author_id,
        content: input.content.clone(),
        created_at: now,
    })
}

async fn list_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(LIST_FOR_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            },
            author_username: row.get("author_username"),
        })
        .collect())
}

// MySQL

async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.author_id)
    .bind(&input.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id: input.post_id,
        author_id: input.author_id,
        content: input.content.clone(),
        created_at: now,
    })
}

async fn list_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(LIST_FOR_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            },
            author_username: row.get("author_username"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreatePostInput, User};

    async fn setup() -> (DynDatabasePool, SqlxCommentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("ana".into(), "ana@example.com".into(), "h".into(), true))
            .await
            .expect("create user");
        let post = SqlxPostRepository::new(pool.clone())
            .create(&CreatePostInput {
                title: "Post".into(),
                content: "<p>x</p>".into(),
                author_id: user.id,
                category_id: None,
                image: None,
                published: true,
                tag_names: Vec::new(),
                gallery: Vec::new(),
            })
            .await
            .expect("create post");
        (pool.clone(), SqlxCommentRepository::new(pool), user.id, post.id)
    }

    #[tokio::test]
    async fn test_comments_newest_first_with_author() {
        let (_pool, repo, user_id, post_id) = setup().await;
        for text in ["primero", "segundo", "tercero"] {
            repo.create(&CreateCommentInput {
                post_id,
                author_id: user_id,
                content: text.into(),
            })
            .await
            .expect("create comment");
        }

        let comments = repo.list_for_post(post_id).await.expect("list");
        let texts: Vec<_> = comments.iter().map(|c| c.comment.content.as_str()).collect();
        assert_eq!(texts, vec!["tercero", "segundo", "primero"]);
        assert!(comments.iter().all(|c| c.author_username == "ana"));
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_fails() {
        let (_pool, repo, user_id, post_id) = setup().await;
        let result = repo
            .create(&CreateCommentInput {
                post_id: post_id + 1,
                author_id: user_id,
                content: "hola".into(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_comments_deleted_with_post() {
        let (pool, repo, user_id, post_id) = setup().await;
        repo.create(&CreateCommentInput {
            post_id,
            author_id: user_id,
            content: "hola".into(),
        })
        .await
        .expect("create comment");

        SqlxPostRepository::new(pool)
            .delete(post_id)
            .await
            .expect("delete post");
        assert!(repo.list_for_post(post_id).await.expect("list").is_empty());
    }
}
