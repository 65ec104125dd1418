//! Tag repository
//!
//! This module provides:
//! - `TagRepository` trait for read access and standalone tag replacement
//! - Connection-level resolver functions that run inside a caller's
//!   transaction, used by the post repository
//!
//! Tags are identified by `name_key`, the lower-cased name, which carries a
//! unique index. Resolution is find-or-create: when an insert loses a race
//! against a concurrent writer the unique violation is swallowed and the
//! winning row is read back.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{tag_key, Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// How many find-or-create rounds a single name gets before giving up
pub const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find a tag by name, ignoring letter case
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Tags attached to a post
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Tags ordered by number of published posts, most used first
    async fn featured(&self, limit: i64) -> Result<Vec<TagWithCount>>;

    /// Replace a post's tag set in a transaction of its own
    async fn replace_for_post(&self, post_id: i64, names: &[String]) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let key = tag_key(name);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut conn = sqlite_pool(&self.pool)?
                    .acquire()
                    .await
                    .context("Failed to acquire connection")?;
                find_tag_by_key_sqlite(&mut conn, &key).await
            }
            DatabaseDriver::Mysql => {
                let mut conn = mysql_pool(&self.pool)?
                    .acquire()
                    .await
                    .context("Failed to acquire connection")?;
                find_tag_by_key_mysql(&mut conn, &key, false).await
            }
        }
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_for_post_sqlite(sqlite_pool(&self.pool)?, post_id).await,
            DatabaseDriver::Mysql => list_tags_for_post_mysql(mysql_pool(&self.pool)?, post_id).await,
        }
    }

    async fn featured(&self, limit: i64) -> Result<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => featured_tags_sqlite(sqlite_pool(&self.pool)?, limit).await,
            DatabaseDriver::Mysql => featured_tags_mysql(mysql_pool(&self.pool)?, limit).await,
        }
    }

    async fn replace_for_post(&self, post_id: i64, names: &[String]) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = sqlite_pool(&self.pool)?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                let tags = replace_post_tags_sqlite(&mut tx, post_id, names).await?;
                tx.commit().await.context("Failed to commit tag update")?;
                Ok(tags)
            }
            DatabaseDriver::Mysql => {
                let mut tx = mysql_pool(&self.pool)?
                    .begin()
                    .await
                    .context("Failed to begin transaction")?;
                let tags = replace_post_tags_mysql(&mut tx, post_id, names).await?;
                tx.commit().await.context("Failed to commit tag update")?;
                Ok(tags)
            }
        }
    }
}

/// Keep the first occurrence of every tag id
fn dedup_tags(tags: Vec<Tag>) -> Vec<Tag> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.id)).collect()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_tag_by_key_sqlite(conn: &mut SqliteConnection, key: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name_key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to look up tag")?;
    Ok(row.map(|r| Tag {
        id: r.get("id"),
        name: r.get("name"),
        created_at: r.get("created_at"),
    }))
}

/// Insert a tag row; `None` when another writer already holds `key`.
pub async fn insert_tag_sqlite(
    conn: &mut SqliteConnection,
    name: &str,
    key: &str,
) -> Result<Option<Tag>> {
    let now = Utc::now();
    let inserted = sqlx::query("INSERT INTO tags (name, name_key, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await;

    match inserted {
        Ok(result) => {
            info!(tag = %name, "Created tag");
            Ok(Some(Tag {
                id: result.last_insert_rowid(),
                name: name.to_string(),
                created_at: now,
            }))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e).context("Failed to create tag"),
    }
}

/// Find or create the tag for `name` on the given connection.
///
/// A new tag keeps `name`'s exact casing.
pub async fn resolve_tag_sqlite(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    let key = tag_key(name);
    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(tag) = find_tag_by_key_sqlite(&mut *conn, &key).await? {
            return Ok(tag);
        }
        if let Some(tag) = insert_tag_sqlite(&mut *conn, name, &key).await? {
            return Ok(tag);
        }
        debug!(tag = %name, attempt, "Tag inserted concurrently, reading it back");
    }
    anyhow::bail!(
        "Could not resolve tag '{}' after {} attempts",
        name,
        MAX_RESOLVE_ATTEMPTS
    )
}

/// Replace every tag of `post_id` with the tags named in `names`.
///
/// Names that resolve to the same tag are linked once. Returns the distinct
/// tags in first-seen order.
pub async fn replace_post_tags_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    names: &[String],
) -> Result<Vec<Tag>> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = resolve_tag_sqlite(&mut *conn, name).await?;
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await
            .context("Failed to link tag to post")?;
        tags.push(tag);
    }
    Ok(dedup_tags(tags))
}

async fn list_tags_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.created_at
        FROM tags t
        INNER JOIN post_tags pt ON pt.tag_id = t.id
        WHERE pt.post_id = ?
        ORDER BY t.id
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list post tags")?;

    Ok(rows
        .iter()
        .map(|r| Tag {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        })
        .collect())
}

async fn featured_tags_sqlite(pool: &SqlitePool, limit: i64) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(FEATURED_TAGS_SQL)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to get featured tags")?;

    Ok(rows
        .iter()
        .map(|r| {
            TagWithCount::new(
                Tag {
                    id: r.get("id"),
                    name: r.get("name"),
                    created_at: r.get("created_at"),
                },
                r.get("post_count"),
            )
        })
        .collect())
}

const FEATURED_TAGS_SQL: &str = r#"
    SELECT t.id, t.name, t.created_at, COUNT(p.id) AS post_count
    FROM tags t
    LEFT JOIN post_tags pt ON pt.tag_id = t.id
    LEFT JOIN posts p ON p.id = pt.post_id AND p.published = 1
    GROUP BY t.id, t.name, t.created_at
    ORDER BY post_count DESC, t.id ASC
    LIMIT ?
"#;

// ============================================================================
// MySQL implementations
// ============================================================================

/// With `locking` set the read sees rows committed after the transaction's
/// snapshot, which is needed to pick up a concurrent winner.
async fn find_tag_by_key_mysql(
    conn: &mut MySqlConnection,
    key: &str,
    locking: bool,
) -> Result<Option<Tag>> {
    let sql = if locking {
        "SELECT id, name, created_at FROM tags WHERE name_key = ? LOCK IN SHARE MODE"
    } else {
        "SELECT id, name, created_at FROM tags WHERE name_key = ?"
    };
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to look up tag")?;
    Ok(row.map(|r| Tag {
        id: r.get("id"),
        name: r.get("name"),
        created_at: r.get("created_at"),
    }))
}

/// MySQL counterpart of [`insert_tag_sqlite`]
pub async fn insert_tag_mysql(
    conn: &mut MySqlConnection,
    name: &str,
    key: &str,
) -> Result<Option<Tag>> {
    let now = Utc::now();
    let inserted = sqlx::query("INSERT INTO tags (name, name_key, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await;

    match inserted {
        Ok(result) => {
            info!(tag = %name, "Created tag");
            Ok(Some(Tag {
                id: result.last_insert_id() as i64,
                name: name.to_string(),
                created_at: now,
            }))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e).context("Failed to create tag"),
    }
}

/// MySQL counterpart of [`resolve_tag_sqlite`]
pub async fn resolve_tag_mysql(conn: &mut MySqlConnection, name: &str) -> Result<Tag> {
    let key = tag_key(name);
    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(tag) = find_tag_by_key_mysql(&mut *conn, &key, attempt > 1).await? {
            return Ok(tag);
        }
        if let Some(tag) = insert_tag_mysql(&mut *conn, name, &key).await? {
            return Ok(tag);
        }
        debug!(tag = %name, attempt, "Tag inserted concurrently, reading it back");
    }
    anyhow::bail!(
        "Could not resolve tag '{}' after {} attempts",
        name,
        MAX_RESOLVE_ATTEMPTS
    )
}

/// MySQL counterpart of [`replace_post_tags_sqlite`]
pub async fn replace_post_tags_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    names: &[String],
) -> Result<Vec<Tag>> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = resolve_tag_mysql(&mut *conn, name).await?;
        sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await
            .context("Failed to link tag to post")?;
        tags.push(tag);
    }
    Ok(dedup_tags(tags))
}

async fn list_tags_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Tag>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.created_at
        FROM tags t
        INNER JOIN post_tags pt ON pt.tag_id = t.id
        WHERE pt.post_id = ?
        ORDER BY t.id
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list post tags")?;

    Ok(rows
        .iter()
        .map(|r| Tag {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        })
        .collect())
}

async fn featured_tags_mysql(pool: &MySqlPool, limit: i64) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(FEATURED_TAGS_SQL)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to get featured tags")?;

    Ok(rows
        .iter()
        .map(|r| {
            TagWithCount::new(
                Tag {
                    id: r.get("id"),
                    name: r.get("name"),
                    created_at: r.get("created_at"),
                },
                r.get("post_count"),
            )
        })
        .collect())
}
