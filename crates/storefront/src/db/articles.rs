//! Blog article repository.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use lunaria_core::ArticleId;

use super::RepositoryError;
use crate::models::Article;

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    excerpt: String,
    body_markdown: String,
    cover_image: Option<String>,
    published: bool,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: ArticleId::new(row.id),
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            body_markdown: row.body_markdown,
            cover_image: row.cover_image,
            published: row.published,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Article as loaded from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub body: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

const ARTICLE_COLUMNS: &str = "id, slug, title, excerpt, body_markdown, cover_image, published, published_at, created_at, updated_at";

/// Repository for blog articles.
pub struct ArticleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ArticleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published articles, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_published(&self, limit: i64, offset: i64) -> Result<Vec<Article>, RepositoryError> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE published \
             ORDER BY published_at DESC NULLS LAST, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// A published article by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<Article>, RepositoryError> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = $1 AND published"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Article::from))
    }

    /// Insert or update an article keyed by slug.
    ///
    /// Published articles without a date are stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(&self, article: &NewArticle) -> Result<ArticleId, RepositoryError> {
        let published_at = match (article.published, article.published_at) {
            (true, None) => Some(Utc::now()),
            (_, at) => at,
        };

        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO articles (slug, title, excerpt, body_markdown, cover_image, published, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO UPDATE SET
                title = EXCLUDED.title,
                excerpt = EXCLUDED.excerpt,
                body_markdown = EXCLUDED.body_markdown,
                cover_image = EXCLUDED.cover_image,
                published = EXCLUDED.published,
                published_at = COALESCE(articles.published_at, EXCLUDED.published_at),
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.body)
        .bind(article.cover_image.as_deref())
        .bind(article.published)
        .bind(published_at)
        .fetch_one(self.pool)
        .await?;

        Ok(ArticleId::new(id))
    }
}
