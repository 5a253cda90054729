//! Stripe REST client.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::types::{ApiErrorBody, CheckoutSession, CheckoutSessionRequest, List, StripeLineItem};
use super::{PaymentGateway, StripeError};
use crate::config::StripeConfig;

/// Pinned API version so response shapes don't drift with account defaults.
const API_VERSION: &str = "2024-06-20";

/// Expansion that brings product metadata onto session line items.
const LINE_ITEM_PRODUCT_EXPAND: &str = "line_items.data.price.product";

/// Largest page Stripe serves for line item lists.
const LINE_ITEMS_PAGE_LIMIT: &str = "100";

/// Stripe API client for hosted checkout.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);
        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<url::Url, StripeError> {
        let mut url = url::Url::parse(&format!("{}{path}", self.api_base))
            .map_err(|e| StripeError::Parse(format!("Invalid API URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Decode a response, turning non-2xx bodies into [`StripeError::Api`].
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => (
                    parsed.error.decline_code.or(parsed.error.code),
                    parsed.error.message.unwrap_or(body),
                ),
                Err(_) => (None, body),
            };
            return Err(StripeError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }

    /// All line items of a session, products expanded.
    #[instrument(skip(self))]
    async fn list_line_items(&self, session_id: &str) -> Result<List<StripeLineItem>, StripeError> {
        let url = self.url(
            &format!("/v1/checkout/sessions/{session_id}/line_items"),
            &[
                ("limit", LINE_ITEMS_PAGE_LIMIT),
                ("expand[]", "data.price.product"),
            ],
        )?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(line_items = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let url = self.url("/v1/checkout/sessions", &[])?;
        let response = self
            .client
            .post(url)
            .form(&request.to_form_params())
            .send()
            .await?;

        let session: CheckoutSession = Self::decode(response).await?;
        tracing::info!(session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let url = self.url(
            &format!("/v1/checkout/sessions/{session_id}"),
            &[("expand[]", LINE_ITEM_PRODUCT_EXPAND)],
        )?;
        let response = self.client.get(url).send().await?;
        let mut session: CheckoutSession = Self::decode(response).await?;

        // Expansion only embeds the first page of line items.
        if session.line_items.as_ref().is_none_or(|l| l.has_more) {
            session.line_items = Some(self.list_line_items(session_id).await?);
        }

        Ok(session)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from("whsec_test"),
            api_base: "http://localhost:12111".to_string(),
            shipping_rates: Vec::new(),
            allowed_countries: vec!["RO".to_string()],
            automatic_tax: false,
        })
        .unwrap()
    }

    #[test]
    fn test_url_encodes_expand_parameter() {
        let url = client()
            .url("/v1/checkout/sessions/cs_1", &[("expand[]", LINE_ITEM_PRODUCT_EXPAND)])
            .unwrap();
        assert_eq!(url.path(), "/v1/checkout/sessions/cs_1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("expand[]".to_string(), LINE_ITEM_PRODUCT_EXPAND.to_string())]
        );
    }

    #[test]
    fn test_url_without_query() {
        let url = client().url("/v1/checkout/sessions", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:12111/v1/checkout/sessions");
    }
}
