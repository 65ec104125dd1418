//! Category repository
//!
//! Categories are a flat list seeded from configuration at startup.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, name: &str) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// List all categories in creation order
    async fn list(&self) -> Result<Vec<Category>>;

    /// Count categories
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, name: &str) -> Result<Category> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("INSERT INTO categories (name) VALUES (?)")
                .bind(name)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to create category")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query("INSERT INTO categories (name) VALUES (?)")
                .bind(name)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to create category")?
                .last_insert_id() as i64,
        };
        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_category_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_category_by_name_sqlite(sqlite_pool(&self.pool)?, name).await
            }
            DatabaseDriver::Mysql => get_category_by_name_mysql(mysql_pool(&self.pool)?, name).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_categories_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_categories_mysql(mysql_pool(&self.pool)?).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let row = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT COUNT(*) AS count FROM categories")
                    .fetch_one(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to count categories")?;
                row.get::<i64, _>("count")
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query("SELECT COUNT(*) AS count FROM categories")
                    .fetch_one(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to count categories")?;
                row.get::<i64, _>("count")
            }
        };
        Ok(row)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_category_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;
    Ok(row.map(|r| Category {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn get_category_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Category>> {
    // Names are not unique; the oldest row wins
    let row = sqlx::query("SELECT id, name FROM categories WHERE name = ? ORDER BY id LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by name")?;
    Ok(row.map(|r| Category {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn list_categories_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT id, name FROM categories ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows
        .iter()
        .map(|r| Category {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_category_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;
    Ok(row.map(|r| Category {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn get_category_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Category>> {
    // BINARY keeps the lookup exact under case-insensitive collations
    let row = sqlx::query(
        "SELECT id, name FROM categories WHERE BINARY name = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by name")?;
    Ok(row.map(|r| Category {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn list_categories_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT id, name FROM categories ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows
        .iter()
        .map(|r| Category {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let repo = setup_test_repo().await;
        let rpg = repo.create("RPG").await.expect("create");
        let fps = repo.create("Shooters").await.expect("create");

        let all = repo.list().await.expect("list");
        assert_eq!(all, vec![rpg, fps]);
        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_get_by_name_is_exact() {
        let repo = setup_test_repo().await;
        let rpg = repo.create("RPG").await.expect("create");

        let found = repo.get_by_name("RPG").await.expect("query");
        assert_eq!(found, Some(rpg));
        assert!(repo.get_by_name("rpg").await.expect("query").is_none());
        assert!(repo.get_by_name("RPG ").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = setup_test_repo().await;
        let created = repo.create("Indies").await.expect("create");
        let found = repo
            .get_by_id(created.id)
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(found.name, "Indies");
        assert!(repo.get_by_id(created.id + 1).await.expect("query").is_none());
    }
}
