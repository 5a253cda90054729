//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod article;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use article::Article;
pub use order::{NewOrder, Order, PaymentInfo};
pub use product::{OptionError, Product, ProductOption};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
