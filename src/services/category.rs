//! Category service
//!
//! Categories are a flat list seeded from configuration on first start.
//! The full list is cached because every listing page renders it.

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::CategoryRepository;
use crate::models::Category;
use std::sync::Arc;

/// Column limit of `categories.name`
pub const MAX_CATEGORY_NAME_LENGTH: usize = 50;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: SharedCache,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// All categories in creation order
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        let repo = self.repo.clone();
        self.cache
            .get_or_load(keys::CATEGORIES, || async move {
                repo.list().await.map_err(CategoryServiceError::from)
            })
            .await
    }

    /// Look up a category by its exact name
    pub async fn get_by_name(&self, name: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_name(name)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(name.to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    /// Create the configured categories when none exist yet.
    ///
    /// Returns how many were created. Blank and over-long names are skipped.
    pub async fn seed_defaults(&self, names: &[String]) -> Result<usize, CategoryServiceError> {
        if self.repo.count().await? > 0 {
            return Ok(0);
        }

        let mut created = 0;
        for name in names {
            let name = name.trim();
            if name.is_empty() || name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
                tracing::warn!(name, "Skipping invalid default category");
                continue;
            }
            self.repo.create(name).await?;
            created += 1;
        }

        if created > 0 {
            tracing::info!(count = created, "Seeded default categories");
            if let Err(e) = self.cache.delete(keys::CATEGORIES).await {
                tracing::warn!(error = %e, "Failed to invalidate category cache");
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> CategoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CategoryService::new(
            SqlxCategoryRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_seed_defaults_only_on_empty_table() {
        let service = setup().await;

        let created = service
            .seed_defaults(&names(&["RPG", "  ", "Indie"]))
            .await
            .expect("seed");
        assert_eq!(created, 2);

        let again = service
            .seed_defaults(&names(&["Otra"]))
            .await
            .expect("seed");
        assert_eq!(again, 0);

        let list = service.list().await.expect("list");
        let list: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(list, vec!["RPG", "Indie"]);
    }

    #[tokio::test]
    async fn test_get_by_name_is_exact() {
        let service = setup().await;
        service
            .seed_defaults(&names(&["Noticias"]))
            .await
            .expect("seed");

        let found = service.get_by_name("Noticias").await.expect("found");
        assert_eq!(found.name, "Noticias");
        assert!(matches!(
            service.get_by_name("noticias").await,
            Err(CategoryServiceError::NotFound(_))
        ));
        assert!(service.get_by_id(found.id).await.expect("get").is_some());
    }
}
