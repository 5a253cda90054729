//! Lunaria Core - Shared domain types and pricing logic.
//!
//! This crate provides the types and pure logic used across all Lunaria
//! components:
//! - `storefront` - Public JSON API (catalog, cart, checkout, accounts, blog)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Everything that decides a price or an
//! order total lives here so that every call site computes the same number.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, statuses, and options
//! - [`pricing`] - Option surcharges and line totals
//! - [`cart`] - Cart lines and merge semantics
//! - [`order`] - Order snapshots, addresses, and totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartError, CartLine};
pub use order::{Address, OrderItem, OrderTotals};
pub use types::*;
