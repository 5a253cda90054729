//! Blog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use lunaria_core::ArticleId;

use crate::content::{reading_time_minutes, render_markdown};
use crate::db::{ArticleRepository, page_bounds};
use crate::error::{AppError, Result};
use crate::models::Article;
use crate::routes::PageQuery;
use crate::state::AppState;

/// Listing entry; the body is left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub reading_time_minutes: u32,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            reading_time_minutes: reading_time_minutes(&article.body_markdown),
            id: article.id,
            slug: article.slug,
            title: article.title,
            excerpt: article.excerpt,
            cover_image: article.cover_image,
            published_at: article.published_at,
        }
    }
}

/// A full article with its body rendered to HTML.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub summary: ArticleSummary,
    pub body_html: String,
}

/// `GET /api/articles`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ArticleSummary>>> {
    let (page, per_page) = query.resolve();
    let (limit, offset) = page_bounds(page, per_page);
    let articles = ArticleRepository::new(state.pool())
        .list_published(limit, offset)
        .await?;
    Ok(Json(articles.into_iter().map(ArticleSummary::from).collect()))
}

/// `GET /api/articles/{slug}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleDetail>> {
    let article = ArticleRepository::new(state.pool())
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article '{slug}'")))?;

    let body_html = render_markdown(&article.body_markdown);
    Ok(Json(ArticleDetail {
        summary: ArticleSummary::from(article),
        body_html,
    }))
}
