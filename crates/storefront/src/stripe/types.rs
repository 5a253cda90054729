//! Stripe API request and response types.
//!
//! Only the fields the storefront reads are modelled; everything else in
//! Stripe's payloads is ignored during deserialization.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use lunaria_core::{Address, PaymentStatus};

// =============================================================================
// Requests
// =============================================================================

/// One line of a checkout session request, priced server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRequest {
    pub name: String,
    /// Shown under the product name on the hosted page (option summary).
    pub description: Option<String>,
    pub image: Option<String>,
    /// Lower-case ISO currency code.
    pub currency: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub quantity: u32,
    /// Product metadata carried back on the retrieved session.
    pub metadata: BTreeMap<String, String>,
}

/// A hosted checkout session request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<LineItemRequest>,
    pub metadata: BTreeMap<String, String>,
    pub customer_email: Option<String>,
    pub client_reference_id: Option<String>,
    pub allowed_countries: Vec<String>,
    pub shipping_rates: Vec<String>,
    pub automatic_tax: bool,
    /// Hosted page locale, e.g. `ro`.
    pub locale: Option<String>,
}

impl CheckoutSessionRequest {
    /// Encode as Stripe's bracketed form parameters.
    #[must_use]
    pub fn to_form_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            ("billing_address_collection".into(), "required".into()),
        ];

        if let Some(email) = &self.customer_email {
            params.push(("customer_email".into(), email.clone()));
        }
        if let Some(reference) = &self.client_reference_id {
            params.push(("client_reference_id".into(), reference.clone()));
        }
        if let Some(locale) = &self.locale {
            params.push(("locale".into(), locale.clone()));
        }

        for (i, country) in self.allowed_countries.iter().enumerate() {
            params.push((
                format!("shipping_address_collection[allowed_countries][{i}]"),
                country.clone(),
            ));
        }
        for (i, rate) in self.shipping_rates.iter().enumerate() {
            params.push((format!("shipping_options[{i}][shipping_rate]"), rate.clone()));
        }
        if self.automatic_tax {
            params.push(("automatic_tax[enabled]".into(), "true".into()));
        }

        for (key, value) in &self.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            params.push((format!("{prefix}[price_data][currency]"), item.currency.clone()));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));

            let product = format!("{prefix}[price_data][product_data]");
            params.push((format!("{product}[name]"), item.name.clone()));
            if let Some(description) = &item.description {
                params.push((format!("{product}[description]"), description.clone()));
            }
            if let Some(image) = &item.image {
                params.push((format!("{product}[images][0]"), image.clone()));
            }
            for (key, value) in &item.metadata {
                params.push((format!("{product}[metadata][{key}]"), value.clone()));
            }
        }

        params
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// A checkout session as returned by create and retrieve.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page URL (present while the session is open).
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_intent: Option<String>,
    pub currency: Option<String>,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub total_details: Option<TotalDetails>,
    pub shipping_cost: Option<ShippingCost>,
    pub customer_details: Option<CustomerDetails>,
    pub shipping_details: Option<ShippingDetails>,
    pub collected_information: Option<CollectedInformation>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub line_items: Option<List<StripeLineItem>>,
}

impl CheckoutSession {
    /// Shipping details, wherever the API version placed them.
    #[must_use]
    pub fn shipping(&self) -> Option<&ShippingDetails> {
        self.collected_information
            .as_ref()
            .and_then(|c| c.shipping_details.as_ref())
            .or(self.shipping_details.as_ref())
    }

    /// Line items of an expanded session (empty if not expanded).
    #[must_use]
    pub fn line_items(&self) -> &[StripeLineItem] {
        self.line_items.as_ref().map_or(&[], |l| l.data.as_slice())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TotalDetails {
    #[serde(default)]
    pub amount_discount: i64,
    #[serde(default)]
    pub amount_shipping: i64,
    #[serde(default)]
    pub amount_tax: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingCost {
    #[serde(default)]
    pub amount_total: i64,
    pub shipping_rate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<StripeAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub address: Option<StripeAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectedInformation {
    pub shipping_details: Option<ShippingDetails>,
}

/// Address as Stripe reports it; every field may be null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl StripeAddress {
    /// Convert into an order address. `None` when there is no street line.
    #[must_use]
    pub fn to_address(&self, name: Option<&str>, phone: Option<&str>) -> Option<Address> {
        let line1 = self.line1.clone().filter(|l| !l.trim().is_empty())?;
        Some(Address {
            name: name.map(String::from),
            line1,
            line2: self.line2.clone().filter(|l| !l.is_empty()),
            city: self.city.clone().unwrap_or_default(),
            state: self.state.clone().filter(|s| !s.is_empty()),
            postal_code: self.postal_code.clone().unwrap_or_default(),
            country: self.country.clone().unwrap_or_default(),
            phone: phone.map(String::from),
        })
    }
}

/// A line item of a retrieved session.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeLineItem {
    pub id: String,
    pub description: Option<String>,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub amount_subtotal: i64,
    #[serde(default)]
    pub amount_total: i64,
    pub price: Option<StripePrice>,
}

impl StripeLineItem {
    /// The expanded product, if the session was retrieved with expansion.
    #[must_use]
    pub fn product(&self) -> Option<&StripeProduct> {
        match self.price.as_ref()?.product.as_ref()? {
            ProductRef::Expanded(product) => Some(product),
            ProductRef::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub unit_amount: Option<i64>,
    pub product: Option<ProductRef>,
}

/// A product field that is either an ID or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Expanded(StripeProduct),
    Id(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// ID of the event's object (the checkout session for session events).
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(serde_json::Value::as_str)
    }
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_params_encode_line_items_and_metadata() {
        let request = CheckoutSessionRequest {
            success_url: "https://lunaria.ro/checkout/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "https://lunaria.ro/cart".into(),
            line_items: vec![LineItemRequest {
                name: "Moon Pendant".into(),
                description: Some("Length: 45-50cm".into()),
                image: Some("https://cdn.lunaria.ro/moon.jpg".into()),
                currency: "eur".into(),
                unit_amount: 10_000,
                quantity: 2,
                metadata: BTreeMap::from([("product_id".to_string(), "7".to_string())]),
            }],
            metadata: BTreeMap::from([("item_count".to_string(), "2".to_string())]),
            customer_email: Some("ana@example.ro".into()),
            client_reference_id: None,
            allowed_countries: vec!["RO".into(), "MD".into()],
            shipping_rates: vec!["shr_1".into()],
            automatic_tax: true,
            locale: Some("ro".into()),
        };

        let params = request.to_form_params();
        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(param(&params, "line_items[0][price_data][unit_amount]"), Some("10000"));
        assert_eq!(
            param(&params, "line_items[0][price_data][product_data][metadata][product_id]"),
            Some("7")
        );
        assert_eq!(
            param(&params, "line_items[0][price_data][product_data][description]"),
            Some("Length: 45-50cm")
        );
        assert_eq!(param(&params, "metadata[item_count]"), Some("2"));
        assert_eq!(param(&params, "shipping_address_collection[allowed_countries][1]"), Some("MD"));
        assert_eq!(param(&params, "shipping_options[0][shipping_rate]"), Some("shr_1"));
        assert_eq!(param(&params, "automatic_tax[enabled]"), Some("true"));
        assert_eq!(param(&params, "customer_email"), Some("ana@example.ro"));
        assert_eq!(param(&params, "client_reference_id"), None);
    }

    #[test]
    fn test_session_deserializes_expanded_line_items() {
        let json = serde_json::json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "currency": "eur",
            "amount_subtotal": 20000,
            "amount_total": 21500,
            "total_details": {"amount_discount": 0, "amount_shipping": 1500, "amount_tax": 0},
            "customer_details": {"email": "ana@example.ro", "name": "Ana Pop", "phone": null, "address": null},
            "collected_information": {"shipping_details": {"name": "Ana Pop", "address": {
                "line1": "Str. Lunii 7", "line2": null, "city": "Cluj-Napoca",
                "state": null, "postal_code": "400000", "country": "RO"
            }}},
            "metadata": {"user_id": "3"},
            "line_items": {"object": "list", "has_more": false, "data": [{
                "id": "li_1", "description": "Moon Pendant", "quantity": 2,
                "amount_subtotal": 20000, "amount_total": 20000,
                "price": {"unit_amount": 10000, "product": {
                    "id": "prod_1", "name": "Moon Pendant", "images": [],
                    "metadata": {"product_id": "7", "options": "{\"Length\":\"45-50cm\"}"}
                }}
            }]}
        });

        let session: CheckoutSession = serde_json::from_value(json).unwrap();
        assert_eq!(session.payment_status, PaymentStatus::Paid);
        let shipping = session.shipping().unwrap();
        assert_eq!(shipping.address.as_ref().unwrap().city.as_deref(), Some("Cluj-Napoca"));
        let item = &session.line_items()[0];
        assert_eq!(item.product().unwrap().metadata["product_id"], "7");
    }

    #[test]
    fn test_unexpanded_product_is_id() {
        let item: StripeLineItem = serde_json::from_value(serde_json::json!({
            "id": "li_1", "quantity": 1, "price": {"unit_amount": 500, "product": "prod_1"}
        }))
        .unwrap();
        assert!(item.product().is_none());
    }

    #[test]
    fn test_address_without_street_is_none() {
        let address = StripeAddress {
            country: Some("RO".into()),
            ..StripeAddress::default()
        };
        assert!(address.to_address(Some("Ana"), None).is_none());
    }
}
