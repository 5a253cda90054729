//! Catalog route handlers.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use lunaria_core::cart::MAX_LINE_QUANTITY;
use lunaria_core::{CurrencyCode, SelectedOptions, pricing};

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::routes::PageQuery;
use crate::state::AppState;

/// Query prefix for option selections, e.g. `?option.Length=45-50cm`.
const OPTION_PREFIX: &str = "option.";

/// One page of the catalog.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// A product with the price for the requested selection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub selected_options: SelectedOptions,
    pub price: Decimal,
}

/// Price of a selection, for buy-now display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    pub currency: CurrencyCode,
}

/// Collect `option.<Name>=<value>` pairs from a query string map.
fn selected_options(query: &HashMap<String, String>) -> SelectedOptions {
    query
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(OPTION_PREFIX)?;
            (!name.is_empty() && !value.is_empty()).then_some((name, value))
        })
        .fold(SelectedOptions::new(), |options, (name, value)| {
            options.with(name, value)
        })
}

async fn find_product(state: &AppState, slug: &str) -> Result<Product> {
    state
        .catalog()
        .by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product '{slug}'")))
}

fn validated_selection(product: &Product, query: &HashMap<String, String>) -> Result<SelectedOptions> {
    let options = selected_options(query);
    product
        .validate_selection(&options)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(options)
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProductPage>> {
    let (page, per_page) = query.resolve();
    let (products, total) = state.catalog().list(page, per_page).await?;
    let per_page_wide = i64::from(per_page);

    Ok(Json(ProductPage {
        products,
        page,
        per_page,
        total,
        total_pages: (total + per_page_wide - 1) / per_page_wide,
    }))
}

/// `GET /api/products/{slug}`
#[instrument(skip(state, query))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ProductDetail>> {
    let product = find_product(&state, &slug).await?;
    let selected_options = validated_selection(&product, &query)?;
    let price = product.price_for(&selected_options);

    Ok(Json(ProductDetail {
        product,
        selected_options,
        price,
    }))
}

/// `GET /api/products/{slug}/price?quantity=2&option.Length=45-50cm`
#[instrument(skip(state, query))]
pub async fn price(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PriceQuote>> {
    let product = find_product(&state, &slug).await?;
    let selected_options = validated_selection(&product, &query)?;

    let quantity = match query.get("quantity") {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
            .ok_or_else(|| {
                AppError::BadRequest(format!("quantity must be between 1 and {MAX_LINE_QUANTITY}"))
            })?,
        None => 1,
    };

    let line = pricing::price_line(product.base_price, &selected_options, quantity);
    Ok(Json(PriceQuote {
        unit_price: line.unit_price,
        quantity,
        line_total: line.line_total,
        currency: product.currency,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_options_from_query() {
        let query = HashMap::from([
            ("option.Length".to_string(), "45-50cm".to_string()),
            ("option.".to_string(), "ignored".to_string()),
            ("option.Metal".to_string(), String::new()),
            ("quantity".to_string(), "2".to_string()),
        ]);
        let options = selected_options(&query);
        assert_eq!(options.len(), 1);
        assert_eq!(options.get("Length"), Some("45-50cm"));
    }
}
