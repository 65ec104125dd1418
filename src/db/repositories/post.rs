//! Post repository
//!
//! Database operations for posts and their gallery images.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Creating or updating a post writes the post row, its tag set and any new
//! gallery images in one transaction. The post row is written first.

use super::post_query::{build_listing_sql, PostQuery, SqlValue, POST_CARD_SELECT};
use super::tag::{replace_post_tags_mysql, replace_post_tags_sqlite};
use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{
    CreatePostInput, GalleryImage, ImageChange, ListParams, NewGalleryImage, Post, PostCard,
    UpdatePostInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a post with its tags and gallery
    async fn create(&self, input: &CreatePostInput) -> Result<Post>;

    /// Update a post, replacing its tags and appending gallery images.
    /// Returns `None` if the post does not exist.
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Option<Post>>;

    /// Delete a post; comments, gallery rows and tag links go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Get a post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get a post with author, category and comment count
    async fn get_card(&self, id: i64) -> Result<Option<PostCard>>;

    /// Gallery images of a post in upload order
    async fn list_gallery(&self, post_id: i64) -> Result<Vec<GalleryImage>>;

    /// Count the posts a listing query matches
    async fn count(&self, query: &PostQuery) -> Result<i64>;

    /// Fetch listing rows, optionally restricted to one page
    async fn list(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<PostCard>>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(sqlite_pool(&self.pool)?, input).await,
            DatabaseDriver::Mysql => create_post_mysql(mysql_pool(&self.pool)?, input).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(sqlite_pool(&self.pool)?, id, input).await,
            DatabaseDriver::Mysql => update_post_mysql(mysql_pool(&self.pool)?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut conn = sqlite_pool(&self.pool)?
                    .acquire()
                    .await
                    .context("Failed to acquire connection")?;
                get_post_sqlite(&mut conn, id).await
            }
            DatabaseDriver::Mysql => {
                let mut conn = mysql_pool(&self.pool)?
                    .acquire()
                    .await
                    .context("Failed to acquire connection")?;
                get_post_mysql(&mut conn, id).await
            }
        }
    }

    async fn get_card(&self, id: i64) -> Result<Option<PostCard>> {
        let sql = format!("{} WHERE p.id = ?", POST_CARD_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to get post")?;
                row.as_ref().map(row_to_card_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to get post")?;
                row.as_ref().map(row_to_card_mysql).transpose()
            }
        }
    }

    async fn list_gallery(&self, post_id: i64) -> Result<Vec<GalleryImage>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_gallery_sqlite(sqlite_pool(&self.pool)?, post_id).await,
            DatabaseDriver::Mysql => list_gallery_mysql(mysql_pool(&self.pool)?, post_id).await,
        }
    }

    async fn count(&self, query: &PostQuery) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_posts_sqlite(sqlite_pool(&self.pool)?, query).await,
            DatabaseDriver::Mysql => count_posts_mysql(mysql_pool(&self.pool)?, query).await,
        }
    }

    async fn list(&self, query: &PostQuery, page: Option<&ListParams>) -> Result<Vec<PostCard>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(sqlite_pool(&self.pool)?, query, page).await,
            DatabaseDriver::Mysql => list_posts_mysql(mysql_pool(&self.pool)?, query, page).await,
        }
    }
}

/// Full listing statement with an optional `LIMIT ? OFFSET ?` tail
fn listing_statement(query: &PostQuery, paged: bool) -> (String, Vec<SqlValue>) {
    let parts = build_listing_sql(query);
    let mut sql = format!(
        "{} {} {}",
        POST_CARD_SELECT, parts.where_clause, parts.order_clause
    );
    if paged {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    (sql, parts.binds)
}

fn count_statement(query: &PostQuery) -> (String, Vec<SqlValue>) {
    let parts = build_listing_sql(query);
    (
        format!("SELECT COUNT(*) AS count FROM posts p {}", parts.where_clause),
        parts.binds,
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, input: &CreatePostInput) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    let id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, author_id, created_at, image, category_id, published)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.author_id)
    .bind(now)
    .bind(&input.image)
    .bind(input.category_id)
    .bind(input.published)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?
    .last_insert_rowid();

    replace_post_tags_sqlite(&mut tx, id, &input.tag_names).await?;
    insert_gallery_sqlite(&mut tx, id, &input.gallery).await?;

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id,
        title: input.title.clone(),
        content: input.content.clone(),
        author_id: input.author_id,
        created_at: now,
        image: input.image.clone(),
        category_id: input.category_id,
        published: input.published,
    })
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &UpdatePostInput,
) -> Result<Option<Post>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = match &input.image {
        ImageChange::Keep => sqlx::query(
            "UPDATE posts SET title = ?, content = ?, category_id = ?, published = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.category_id)
        .bind(input.published)
        .bind(id)
        .execute(&mut *tx)
        .await,
        change => sqlx::query(
            "UPDATE posts SET title = ?, content = ?, category_id = ?, published = ?, image = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.category_id)
        .bind(input.published)
        .bind(new_image(change))
        .bind(id)
        .execute(&mut *tx)
        .await,
    }
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    replace_post_tags_sqlite(&mut tx, id, &input.tag_names).await?;
    insert_gallery_sqlite(&mut tx, id, &input.gallery).await?;
    let post = get_post_sqlite(&mut tx, id).await?;

    tx.commit().await.context("Failed to commit post update")?;
    Ok(post)
}

async fn insert_gallery_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    images: &[NewGalleryImage],
) -> Result<()> {
    for image in images {
        sqlx::query("INSERT INTO gallery_images (post_id, image, description) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(&image.image)
            .bind(&image.description)
            .execute(&mut *conn)
            .await
            .context("Failed to add gallery image")?;
    }
    Ok(())
}

async fn get_post_sqlite(conn: &mut SqliteConnection, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, content, author_id, created_at, image, category_id, published
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn list_gallery_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<GalleryImage>> {
    let rows = sqlx::query(
        "SELECT id, post_id, image, description FROM gallery_images WHERE post_id = ? ORDER BY id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list gallery images")?;

    Ok(rows
        .iter()
        .map(|r| GalleryImage {
            id: r.get("id"),
            post_id: r.get("post_id"),
            image: r.get("image"),
            description: r.get("description"),
        })
        .collect())
}

async fn count_posts_sqlite(pool: &SqlitePool, query: &PostQuery) -> Result<i64> {
    let (sql, binds) = count_statement(query);
    let mut q = sqlx::query(&sql);
    for value in binds {
        q = match value {
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Text(v) => q.bind(v),
        };
    }
    let row = q.fetch_one(pool).await.context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    query: &PostQuery,
    page: Option<&ListParams>,
) -> Result<Vec<PostCard>> {
    let (sql, binds) = listing_statement(query, page.is_some());
    let mut q = sqlx::query(&sql);
    for value in binds {
        q = match value {
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Text(v) => q.bind(v),
        };
    }
    if let Some(page) = page {
        q = q.bind(page.limit()).bind(page.offset());
    }
    let rows = q.fetch_all(pool).await.context("Failed to list posts")?;
    rows.iter().map(row_to_card_sqlite).collect()
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        image: row.get("image"),
        category_id: row.get("category_id"),
        published: row.get("published"),
    })
}

fn row_to_card_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostCard> {
    Ok(PostCard {
        post: row_to_post_sqlite(row)?,
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        comment_count: row.get("comment_count"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    let id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, author_id, created_at, image, category_id, published)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.author_id)
    .bind(now)
    .bind(&input.image)
    .bind(input.category_id)
    .bind(input.published)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?
    .last_insert_id() as i64;

    replace_post_tags_mysql(&mut tx, id, &input.tag_names).await?;
    insert_gallery_mysql(&mut tx, id, &input.gallery).await?;

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id,
        title: input.title.clone(),
        content: input.content.clone(),
        author_id: input.author_id,
        created_at: now,
        image: input.image.clone(),
        category_id: input.category_id,
        published: input.published,
    })
}

async fn update_post_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &UpdatePostInput,
) -> Result<Option<Post>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // MySQL reports matched rows as zero when nothing changed, so check existence
    if get_post_mysql(&mut tx, id).await?.is_none() {
        return Ok(None);
    }

    match &input.image {
        ImageChange::Keep => sqlx::query(
            "UPDATE posts SET title = ?, content = ?, category_id = ?, published = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.category_id)
        .bind(input.published)
        .bind(id)
        .execute(&mut *tx)
        .await,
        change => sqlx::query(
            "UPDATE posts SET title = ?, content = ?, category_id = ?, published = ?, image = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.category_id)
        .bind(input.published)
        .bind(new_image(change))
        .bind(id)
        .execute(&mut *tx)
        .await,
    }
    .context("Failed to update post")?;

    replace_post_tags_mysql(&mut tx, id, &input.tag_names).await?;
    insert_gallery_mysql(&mut tx, id, &input.gallery).await?;
    let post = get_post_mysql(&mut tx, id).await?;

    tx.commit().await.context("Failed to commit post update")?;
    Ok(post)
}

async fn insert_gallery_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    images: &[NewGalleryImage],
) -> Result<()> {
    for image in images {
        sqlx::query("INSERT INTO gallery_images (post_id, image, description) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(&image.image)
            .bind(&image.description)
            .execute(&mut *conn)
            .await
            .context("Failed to add gallery image")?;
    }
    Ok(())
}

async fn get_post_mysql(conn: &mut MySqlConnection, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, content, author_id, created_at, image, category_id, published
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn list_gallery_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<GalleryImage>> {
    let rows = sqlx::query(
        "SELECT id, post_id, image, description FROM gallery_images WHERE post_id = ? ORDER BY id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list gallery images")?;

    Ok(rows
        .iter()
        .map(|r| GalleryImage {
            id: r.get("id"),
            post_id: r.get("post_id"),
            image: r.get("image"),
            description: r.get("description"),
        })
        .collect())
}

async fn count_posts_mysql(pool: &MySqlPool, query: &PostQuery) -> Result<i64> {
    let (sql, binds) = count_statement(query);
    let mut q = sqlx::query(&sql);
    for value in binds {
        q = match value {
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Text(v) => q.bind(v),
        };
    }
    let row = q.fetch_one(pool).await.context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    query: &PostQuery,
    page: Option<&ListParams>,
) -> Result<Vec<PostCard>> {
    let (sql, binds) = listing_statement(query, page.is_some());
    let mut q = sqlx::query(&sql);
    for value in binds {
        q = match value {
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Text(v) => q.bind(v),
        };
    }
    if let Some(page) = page {
        q = q.bind(page.limit()).bind(page.offset());
    }
    let rows = q.fetch_all(pool).await.context("Failed to list posts")?;
    rows.iter().map(row_to_card_mysql).collect()
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        image: row.get("image"),
        category_id: row.get("category_id"),
        published: row.get("published"),
    })
}

fn row_to_card_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PostCard> {
    Ok(PostCard {
        post: row_to_post_mysql(row)?,
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        comment_count: row.get("comment_count"),
    })
}

fn new_image(change: &ImageChange) -> Option<String> {
    match change {
        ImageChange::Replace(path) => Some(path.clone()),
        ImageChange::Keep | ImageChange::Remove => None,
    }
}
