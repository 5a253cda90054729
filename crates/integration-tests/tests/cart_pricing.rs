//! Cart merge semantics and display pricing.
//!
//! Run with: cargo test -p lunaria-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use lunaria_core::cart::MAX_LINE_QUANTITY;
use lunaria_core::{Cart, CartError, CartLine, CurrencyCode, ProductId, SelectedOptions, pricing};
use lunaria_integration_tests::{FakeCatalog, moon_pendant, product};
use lunaria_storefront::services::cart::view_cart;

fn long_chain() -> SelectedOptions {
    SelectedOptions::new().with("Length", "45-50cm")
}

fn short_chain() -> SelectedOptions {
    SelectedOptions::new().with("Length", "40-45cm")
}

// ============================================================================
// Pricing
// ============================================================================

#[test]
fn test_surcharge_applies_once_per_matching_value() {
    let base = Decimal::new(95, 0);
    assert_eq!(pricing::unit_price(base, &short_chain()), base);
    assert_eq!(pricing::unit_price(base, &long_chain()), Decimal::new(100, 0));
    assert_eq!(pricing::unit_price(base, &SelectedOptions::new()), base);
}

#[test]
fn test_line_total_scales_with_quantity() {
    for quantity in [1, 2, 7, MAX_LINE_QUANTITY] {
        let line = pricing::price_line(Decimal::new(4990, 2), &long_chain(), quantity);
        assert_eq!(line.unit_price, Decimal::new(5490, 2));
        assert_eq!(line.line_total, line.unit_price * Decimal::from(quantity));
    }
}

#[test]
fn test_option_order_does_not_change_identity_or_price() {
    let a = SelectedOptions::new().with("Length", "45-50cm").with("Metal", "Silver");
    let b = SelectedOptions::new().with("Metal", "Silver").with("Length", "45-50cm");
    assert_eq!(a, b);
    assert_eq!(
        pricing::unit_price(Decimal::new(95, 0), &a),
        pricing::unit_price(Decimal::new(95, 0), &b)
    );
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_equal_lines_merge_and_different_options_do_not() {
    let mut cart = Cart::new();
    let id = ProductId::new(1);

    assert_eq!(cart.add(CartLine::new(id, 1, long_chain())).unwrap(), 0);
    assert_eq!(cart.add(CartLine::new(id, 2, long_chain())).unwrap(), 0);
    assert_eq!(cart.add(CartLine::new(id, 1, short_chain())).unwrap(), 1);

    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.lines()[0].quantity, 3);
    assert_eq!(cart.total_quantity(), 4);
}

#[test]
fn test_merge_caps_quantity() {
    let mut cart = Cart::new();
    let id = ProductId::new(1);
    cart.add(CartLine::new(id, 90, long_chain())).unwrap();
    cart.add(CartLine::new(id, 20, long_chain())).unwrap();
    assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
}

#[test]
fn test_cart_mutations_reject_bad_input() {
    let mut cart = Cart::new();
    let id = ProductId::new(1);
    assert_eq!(
        cart.add(CartLine::new(id, 0, SelectedOptions::new())),
        Err(CartError::InvalidQuantity(0))
    );
    assert_eq!(cart.set_quantity(3, 1), Err(CartError::LineNotFound(3)));

    cart.add(CartLine::new(id, 1, SelectedOptions::new())).unwrap();
    cart.set_quantity(0, 0).unwrap();
    assert!(cart.is_empty());
}

#[test]
fn test_cart_session_json_shape() {
    let mut cart = Cart::new();
    cart.add(CartLine::new(ProductId::new(7), 2, long_chain())).unwrap();
    let json = serde_json::to_value(&cart).unwrap();
    assert_eq!(json["lines"][0]["productId"], 7);
    assert_eq!(json["lines"][0]["selectedOptions"]["Length"], "45-50cm");

    let back: Cart = serde_json::from_value(json).unwrap();
    assert_eq!(back, cart);
}

// ============================================================================
// Cart view
// ============================================================================

#[tokio::test]
async fn test_view_prices_lines_from_catalog() {
    let catalog = FakeCatalog::new([moon_pendant(), product(2, "star-ring", Decimal::new(4990, 2))]);
    let mut cart = Cart::new();
    cart.add(CartLine::new(ProductId::new(1), 2, long_chain())).unwrap();
    cart.add(CartLine::new(ProductId::new(2), 1, SelectedOptions::new())).unwrap();

    let (view, changed) = view_cart(&catalog, &mut cart, CurrencyCode::EUR).await.unwrap();

    assert!(!changed);
    assert_eq!(view.lines.len(), 2);
    assert_eq!(view.lines[0].unit_price, Decimal::new(100, 0));
    assert_eq!(view.lines[0].line_total, Decimal::new(200, 0));
    assert_eq!(view.lines[1].line_total, Decimal::new(4990, 2));
    assert_eq!(view.subtotal, Decimal::new(24990, 2));
    assert_eq!(view.item_count, 3);
}

#[tokio::test]
async fn test_view_drops_deleted_products() {
    let catalog = FakeCatalog::new([moon_pendant()]);
    let mut cart = Cart::new();
    cart.add(CartLine::new(ProductId::new(99), 1, SelectedOptions::new())).unwrap();
    cart.add(CartLine::new(ProductId::new(1), 1, short_chain())).unwrap();

    let (view, changed) = view_cart(&catalog, &mut cart, CurrencyCode::EUR).await.unwrap();

    assert!(changed);
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].index, 0);
    assert_eq!(view.subtotal, Decimal::new(95, 0));
}

#[tokio::test]
async fn test_view_flags_lines_checkout_would_reject() {
    let mut sold_out = product(2, "star-ring", Decimal::new(4990, 2));
    sold_out.in_stock = false;
    let mut lei = product(3, "sun-earrings", Decimal::new(250, 0));
    lei.currency = CurrencyCode::RON;
    let catalog = FakeCatalog::new([moon_pendant(), sold_out, lei]);

    let mut cart = Cart::new();
    cart.add(CartLine::new(ProductId::new(1), 1, short_chain())).unwrap();
    cart.add(CartLine::new(ProductId::new(2), 1, SelectedOptions::new())).unwrap();
    cart.add(CartLine::new(ProductId::new(3), 1, SelectedOptions::new())).unwrap();

    let (view, changed) = view_cart(&catalog, &mut cart, CurrencyCode::EUR).await.unwrap();

    assert!(!changed);
    assert!(view.lines[0].purchasable);
    assert!(!view.lines[1].purchasable);
    assert!(!view.lines[2].purchasable);
    assert_eq!(view.lines[2].currency, CurrencyCode::RON);
    // RON line stays visible but is not summed into the EUR subtotal.
    assert_eq!(view.subtotal, Decimal::new(14490, 2));
    assert_eq!(view.currency, CurrencyCode::EUR);
}
