//! Status enums for orders, payments, and one-time tokens.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Orders are only ever created from a confirmed checkout session, so there
/// is no "draft" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Session completed but payment has not cleared (delayed methods).
    #[default]
    Pending,
    /// Paid, awaiting fulfillment.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still move to another status.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl OrderStatus {
    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment status as reported by the payment provider's checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Whether funds are captured (or nothing was owed).
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::NoPaymentRequired)
    }

    /// The order status a freshly materialized order should start in.
    #[must_use]
    pub const fn initial_order_status(self) -> OrderStatus {
        if self.is_settled() {
            OrderStatus::Processing
        } else {
            OrderStatus::Pending
        }
    }

    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "unpaid" => Ok(Self::Unpaid),
            "no_payment_required" => Ok(Self::NoPaymentRequired),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// Purpose of a one-time verification token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    /// How long a token of this purpose stays valid.
    #[must_use]
    pub const fn ttl(self) -> chrono::Duration {
        match self {
            Self::EmailVerification => chrono::Duration::hours(24),
            Self::PasswordReset => chrono::Duration::hours(1),
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_status_initial_order_status() {
        assert_eq!(
            PaymentStatus::Paid.initial_order_status(),
            OrderStatus::Processing
        );
        assert_eq!(
            PaymentStatus::NoPaymentRequired.initial_order_status(),
            OrderStatus::Processing
        );
        assert_eq!(
            PaymentStatus::Unpaid.initial_order_status(),
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_payment_status_serde_matches_provider() {
        let status: PaymentStatus =
            serde_json::from_str("\"no_payment_required\"").expect("deserialize");
        assert_eq!(status, PaymentStatus::NoPaymentRequired);
    }

    #[test]
    fn test_token_ttl() {
        assert_eq!(TokenPurpose::PasswordReset.ttl(), chrono::Duration::hours(1));
        assert!(TokenPurpose::EmailVerification.ttl() > TokenPurpose::PasswordReset.ttl());
    }
}
