//! Catalog helpers: slugs and the cached category list.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use moka::future::Cache;
use regex::Regex;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{CategoryRepository, RepositoryError};
use crate::models::Category;

/// Runs of anything that is not a lowercase letter or digit.
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex"));

/// URL-safe slug: lowercase ASCII alphanumerics joined by single hyphens.
///
/// Returns an empty string when `name` has no usable characters.
#[must_use]
pub fn slugify(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    NON_SLUG_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_owned()
}

/// In-process cache of the category list.
///
/// Every category write must call [`CategoryCache::invalidate`].
#[derive(Clone)]
pub struct CategoryCache {
    cache: Cache<(), Arc<Vec<Category>>>,
}

impl CategoryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Cached list, loading from the database on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if loading fails.
    #[instrument(skip(self, pool))]
    pub async fn list(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(categories) = self.cache.get(&()).await {
            debug!("category cache hit");
            return Ok(categories);
        }

        let categories = Arc::new(CategoryRepository::new(pool).list().await?);
        self.cache.insert((), Arc::clone(&categories)).await;
        Ok(categories)
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Men's T-Shirts"), "men-s-t-shirts");
        assert_eq!(slugify("  Home & Living  "), "home-living");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("a -- b__c"), "a-b-c");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
        assert_eq!(slugify("!!!"), "");
    }

    #[tokio::test]
    async fn test_cache_starts_empty_and_invalidates() {
        let cache = CategoryCache::default();
        assert!(cache.cache.get(&()).await.is_none());
        cache.cache.insert((), Arc::new(Vec::new())).await;
        assert!(cache.cache.get(&()).await.is_some());
        cache.invalidate().await;
        assert!(cache.cache.get(&()).await.is_none());
    }
}
