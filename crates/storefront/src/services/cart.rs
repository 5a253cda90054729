//! Cart presentation.
//!
//! The session cart stores only product IDs, options, and quantities. The
//! view priced here is recomputed on every read so it always reflects the
//! current catalog.

use rust_decimal::Decimal;
use serde::Serialize;

use lunaria_core::{Cart, CurrencyCode, ProductId, SelectedOptions, pricing};

use crate::db::RepositoryError;
use crate::services::catalog::ProductLookup;

/// One priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    /// Position in the cart, used by the update and remove endpoints.
    pub index: usize,
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub selected_options: SelectedOptions,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub currency: CurrencyCode,
    pub in_stock: bool,
    /// In stock and priced in the store currency; checkout rejects the
    /// cart while any line is not.
    pub purchasable: bool,
}

/// The priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    /// Sum of the lines priced in `currency`.
    pub subtotal: Decimal,
    pub item_count: u32,
    pub currency: CurrencyCode,
}

/// Price a cart for display.
///
/// Lines whose product has been deleted are dropped from `cart`; the caller
/// should persist the cart when the returned flag is `true`. Lines priced in
/// another currency are kept but flagged and left out of the subtotal.
///
/// # Errors
///
/// Returns `RepositoryError` if a product lookup fails.
pub async fn view_cart<L: ProductLookup>(
    lookup: &L,
    cart: &mut Cart,
    currency: CurrencyCode,
) -> Result<(CartView, bool), RepositoryError> {
    let mut missing = Vec::new();
    let mut lines = Vec::with_capacity(cart.lines().len());

    for line in cart.lines() {
        let Some(product) = lookup.product(line.product_id).await? else {
            missing.push(line.product_id);
            continue;
        };
        let price = pricing::price_line(product.base_price, &line.selected_options, line.quantity);
        lines.push(CartLineView {
            index: 0,
            product_id: product.id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            image: product.primary_image().map(String::from),
            quantity: line.quantity,
            selected_options: line.selected_options.clone(),
            unit_price: price.unit_price,
            line_total: price.line_total,
            currency: product.currency,
            in_stock: product.in_stock,
            purchasable: product.in_stock && product.currency == currency,
        });
    }

    let changed = !missing.is_empty();
    if changed {
        cart.retain_products(|id| !missing.contains(&id));
    }
    for (index, line) in lines.iter_mut().enumerate() {
        line.index = index;
    }

    let view = CartView {
        subtotal: lines
            .iter()
            .filter(|l| l.currency == currency)
            .map(|l| l.line_total)
            .sum(),
        item_count: lines.iter().map(|l| l.quantity).sum(),
        lines,
        currency,
    };
    Ok((view, changed))
}
