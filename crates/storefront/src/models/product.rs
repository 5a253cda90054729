//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lunaria_core::{CurrencyCode, ProductId, SelectedOptions, pricing};

/// A configurable option of a product, e.g. chain length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

/// A selection that does not match the product's option matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("product has no option named '{0}'")]
    UnknownOption(String),
    #[error("'{value}' is not a valid value for option '{name}'")]
    UnknownValue { name: String, value: String },
}

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    pub currency: CurrencyCode,
    pub images: Vec<String>,
    pub options: Vec<ProductOption>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used for cart and order thumbnails.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Check that every selected option exists on this product with a listed
    /// value. Options the shopper left unselected are allowed.
    ///
    /// # Errors
    ///
    /// Returns the first [`OptionError`] found.
    pub fn validate_selection(&self, selected: &SelectedOptions) -> Result<(), OptionError> {
        for (name, value) in selected.iter() {
            let option = self
                .options
                .iter()
                .find(|o| o.name == name)
                .ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
            if !option.values.iter().any(|v| v == value) {
                return Err(OptionError::UnknownValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Unit price for a selection, surcharges included.
    #[must_use]
    pub fn price_for(&self, selected: &SelectedOptions) -> Decimal {
        pricing::unit_price(self.base_price, selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pendant() -> Product {
        Product {
            id: ProductId::new(7),
            slug: "moon-pendant".to_string(),
            name: "Moon Pendant".to_string(),
            description: String::new(),
            base_price: Decimal::new(95, 0),
            currency: CurrencyCode::EUR,
            images: vec!["https://cdn.lunaria.ro/moon.jpg".to_string()],
            options: vec![ProductOption {
                name: "Length".to_string(),
                values: vec!["40-45cm".to_string(), "45-50cm".to_string()],
            }],
            in_stock: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_selection_accepts_listed_values() {
        let product = pendant();
        assert!(product.validate_selection(&SelectedOptions::new()).is_ok());
        let options = SelectedOptions::new().with("Length", "45-50cm");
        assert!(product.validate_selection(&options).is_ok());
    }

    #[test]
    fn test_validate_selection_rejects_unknown() {
        let product = pendant();
        let bad_name = SelectedOptions::new().with("Metal", "Gold");
        assert_eq!(
            product.validate_selection(&bad_name),
            Err(OptionError::UnknownOption("Metal".to_string()))
        );
        let bad_value = SelectedOptions::new().with("Length", "60cm");
        assert!(matches!(
            product.validate_selection(&bad_value),
            Err(OptionError::UnknownValue { .. })
        ));
    }

    #[test]
    fn test_price_for_applies_surcharge() {
        let product = pendant();
        let long = SelectedOptions::new().with("Length", "45-50cm");
        assert_eq!(product.price_for(&long), Decimal::new(100, 0));
        assert_eq!(product.price_for(&SelectedOptions::new()), Decimal::new(95, 0));
        assert_eq!(product.primary_image(), Some("https://cdn.lunaria.ro/moon.jpg"));
    }
}
