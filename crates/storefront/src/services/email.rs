//! Transactional email: order confirmations, verification, password reset.
//!
//! Uses SMTP via lettre for delivery with Askama templates (plain text and
//! HTML alternatives). When SMTP is not configured every send is logged and
//! skipped.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use lunaria_core::{CurrencyCode, OrderId, Price};

use crate::config::EmailConfig;
use crate::models::NewOrder;

/// One line of the order confirmation.
pub struct EmailLine {
    pub name: String,
    pub options: String,
    pub quantity: u32,
    pub line_total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order_id: OrderId,
    customer_name: Option<&'a str>,
    paid: bool,
    items: &'a [EmailLine],
    subtotal: String,
    shipping: String,
    tax: String,
    total: String,
    shipping_address: Option<String>,
    store_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order_id: OrderId,
    customer_name: Option<&'a str>,
    paid: bool,
    items: &'a [EmailLine],
    subtotal: String,
    shipping: String,
    tax: String,
    total: String,
    shipping_address: Option<String>,
    store_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationText<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<Mailer>,
    base_url: String,
}

impl EmailService {
    /// Create a new email service. `None` config disables delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, SmtpError> {
        let mailer = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );
                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                Some(Mailer {
                    transport,
                    from_address: config.from_address.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            mailer,
            base_url: base_url.to_string(),
        })
    }

    /// A service that never sends.
    #[must_use]
    pub fn disabled(base_url: &str) -> Self {
        Self {
            mailer: None,
            base_url: base_url.to_string(),
        }
    }

    /// Whether SMTP delivery is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send the order confirmation for a freshly created order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        order: &NewOrder,
    ) -> Result<(), EmailError> {
        let currency = order.totals.currency;
        let items = email_lines(order, currency);
        let shipping_address = order.shipping_address.as_ref().map(lunaria_core::Address::one_line);
        let customer_name = order.customer_name.as_deref();
        let paid = order.payment.status.is_settled();

        let html = OrderConfirmationHtml {
            order_id,
            customer_name,
            paid,
            items: &items,
            subtotal: money(order.totals.subtotal, currency),
            shipping: money(order.totals.shipping_cost, currency),
            tax: money(order.totals.tax, currency),
            total: money(order.totals.total, currency),
            shipping_address: shipping_address.clone(),
            store_url: &self.base_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            order_id,
            customer_name,
            paid,
            items: &items,
            subtotal: money(order.totals.subtotal, currency),
            shipping: money(order.totals.shipping_cost, currency),
            tax: money(order.totals.tax, currency),
            total: money(order.totals.total, currency),
            shipping_address,
            store_url: &self.base_url,
        }
        .render()?;

        self.send_multipart_email(to, &format!("Lunaria order #{order_id}"), &text, &html)
            .await
    }

    /// Send the email verification link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification(&self, to: &str, name: &str, token: &str) -> Result<(), EmailError> {
        let link = format!("{}/account/verify-email?token={token}", self.base_url);
        let html = VerificationHtml { name, link: &link }.render()?;
        let text = VerificationText { name, link: &link }.render()?;

        self.send_multipart_email(to, "Confirm your Lunaria account", &text, &html)
            .await
    }

    /// Send the password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(&self, to: &str, name: &str, token: &str) -> Result<(), EmailError> {
        let link = format!("{}/account/reset-password?token={token}", self.base_url);
        let html = PasswordResetHtml { name, link: &link }.render()?;
        let text = PasswordResetText { name, link: &link }.render()?;

        self.send_multipart_email(to, "Reset your Lunaria password", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %subject, "SMTP not configured, skipping email");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                mailer
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(mailer.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        mailer.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn money(amount: rust_decimal::Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).to_string()
}

fn email_lines(order: &NewOrder, currency: CurrencyCode) -> Vec<EmailLine> {
    order
        .items
        .iter()
        .map(|item| EmailLine {
            name: item.name.clone(),
            options: item.selected_options.summary(),
            quantity: item.quantity,
            line_total: money(item.line_total, currency),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lunaria_core::{OrderItem, OrderStatus, OrderTotals, PaymentStatus, ProductId, SelectedOptions};
    use rust_decimal::Decimal;

    use crate::models::PaymentInfo;

    fn order() -> NewOrder {
        let item = OrderItem::new(
            Some(ProductId::new(7)),
            "Moon Pendant".to_string(),
            None,
            2,
            SelectedOptions::new().with("Length", "45-50cm"),
            Decimal::new(100, 0),
        );
        NewOrder {
            user_id: None,
            customer_email: Some("ana@example.ro".to_string()),
            customer_name: Some("Ana <Pop>".to_string()),
            items: vec![item],
            shipping_address: None,
            billing_address: None,
            payment: PaymentInfo {
                session_id: "cs_1".to_string(),
                payment_intent_id: None,
                status: PaymentStatus::Paid,
            },
            totals: OrderTotals::new(CurrencyCode::EUR, Decimal::new(200, 0), Decimal::new(15, 0), Decimal::ZERO),
            status: OrderStatus::Processing,
            guest_checkout: true,
        }
    }

    #[test]
    fn test_order_confirmation_renders_lines_and_totals() {
        let order = order();
        let items = email_lines(&order, CurrencyCode::EUR);
        let text = OrderConfirmationText {
            order_id: OrderId::new(42),
            customer_name: order.customer_name.as_deref(),
            paid: true,
            items: &items,
            subtotal: money(order.totals.subtotal, CurrencyCode::EUR),
            shipping: money(order.totals.shipping_cost, CurrencyCode::EUR),
            tax: money(order.totals.tax, CurrencyCode::EUR),
            total: money(order.totals.total, CurrencyCode::EUR),
            shipping_address: None,
            store_url: "https://lunaria.ro",
        }
        .render()
        .unwrap();

        assert!(text.contains("#42"));
        assert!(text.contains("Moon Pendant (Length: 45-50cm) x 2"));
        assert!(text.contains("Total: 215.00 EUR"));
    }

    #[test]
    fn test_html_escapes_customer_name() {
        let order = order();
        let items = email_lines(&order, CurrencyCode::EUR);
        let html = OrderConfirmationHtml {
            order_id: OrderId::new(42),
            customer_name: order.customer_name.as_deref(),
            paid: true,
            items: &items,
            subtotal: String::new(),
            shipping: String::new(),
            tax: String::new(),
            total: String::new(),
            shipping_address: None,
            store_url: "https://lunaria.ro",
        }
        .render()
        .unwrap();

        assert!(html.contains("Ana &#60;Pop&#62;") || html.contains("Ana &lt;Pop&gt;"));
    }

    #[tokio::test]
    async fn test_disabled_service_skips_send() {
        let service = EmailService::disabled("https://lunaria.ro");
        assert!(!service.is_enabled());
        service
            .send_verification("ana@example.ro", "Ana", "token")
            .await
            .unwrap();
    }
}
