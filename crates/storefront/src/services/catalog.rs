//! Product lookups with an in-process cache.
//!
//! Cart views and checkout resolve every line by product ID, so lookups by
//! ID go through a `moka` cache (5 minute TTL). Slug lookups and listings
//! read the database directly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::instrument;

use lunaria_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::Product;

/// Cache entry lifetime.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum cached products.
const CACHE_CAPACITY: u64 = 1000;

/// Resolve products by ID.
pub trait ProductLookup: Send + Sync {
    /// The product, or `None` if it no longer exists.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Arc<Product>>, RepositoryError>> + Send;
}

/// Catalog reads backed by `PostgreSQL`.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    cache: Cache<ProductId, Arc<Product>>,
}

impl CatalogService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();
        Self { pool, cache }
    }

    /// A page of products, newest first, and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<Product>, i64), RepositoryError> {
        let repo = ProductRepository::new(&self.pool);
        let (limit, offset) = crate::db::page_bounds(page, per_page);
        let products = repo.list(limit, offset).await?;
        let total = repo.count().await?;
        Ok((products, total))
    }

    /// A product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = ProductRepository::new(&self.pool).get_by_slug(slug).await?;
        if let Some(product) = &product {
            self.cache.insert(product.id, Arc::new(product.clone())).await;
        }
        Ok(product)
    }
}

impl ProductLookup for CatalogService {
    async fn product(&self, id: ProductId) -> Result<Option<Arc<Product>>, RepositoryError> {
        if let Some(product) = self.cache.get(&id).await {
            return Ok(Some(product));
        }

        let Some(product) = ProductRepository::new(&self.pool).get_by_id(id).await? else {
            return Ok(None);
        };
        let product = Arc::new(product);
        self.cache.insert(id, Arc::clone(&product)).await;
        Ok(Some(product))
    }
}
