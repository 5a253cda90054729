//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LUNARIA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `LUNARIA_BASE_URL` - Public URL of the storefront (used for checkout return URLs)
//! - `LUNARIA_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret or restricted key (`sk_...` / `rk_...`)
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook endpoint signing secret (`whsec_...`)
//!
//! ## Optional
//! - `LUNARIA_HOST` - Bind address (default: 127.0.0.1)
//! - `LUNARIA_PORT` - Listen port (default: 3000)
//! - `LUNARIA_CURRENCY` - Store currency (default: EUR)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_SHIPPING_RATES` - Comma-separated shipping rate IDs offered at checkout
//! - `STRIPE_ALLOWED_COUNTRIES` - Comma-separated shipping countries (default: RO)
//! - `STRIPE_AUTOMATIC_TAX` - Enable Stripe Tax on checkout sessions (default: false)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   transactional email; email is disabled unless `SMTP_HOST` is set
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - Sentry error tracking
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for human-readable

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use lunaria_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Currency all catalog prices are expressed in
    pub currency: CurrencyCode,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// SMTP configuration, `None` disables outbound email
    pub email: Option<EmailConfig>,
    /// Sentry configuration
    pub sentry: SentryConfig,
    /// Emit JSON log lines
    pub json_logs: bool,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,
    /// API base URL (overridable for stripe-mock)
    pub api_base: String,
    /// Shipping rate IDs offered on the hosted checkout page
    pub shipping_rates: Vec<String>,
    /// Countries the hosted checkout accepts shipping addresses for
    pub allowed_countries: Vec<String>,
    /// Let Stripe Tax compute tax on the session
    pub automatic_tax: bool,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("shipping_rates", &self.shipping_rates)
            .field("allowed_countries", &self.allowed_countries)
            .field("automatic_tax", &self.automatic_tax)
            .finish()
    }
}

/// SMTP relay configuration.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// `From:` header, e.g. `Lunaria <comenzi@lunaria.ro>`
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check,
    /// Stripe key prefixes).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("LUNARIA_DATABASE_URL")?;
        let host = parse_env("LUNARIA_HOST", "127.0.0.1")?;
        let port = parse_env("LUNARIA_PORT", "3000")?;
        let base_url = get_required_env("LUNARIA_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("LUNARIA_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_required_secret("LUNARIA_SESSION_SECRET")?;
        check_session_secret(session_secret.expose_secret()).map_err(|reason| {
            ConfigError::InsecureSecret("LUNARIA_SESSION_SECRET".to_string(), reason)
        })?;
        let currency = get_env_or_default("LUNARIA_CURRENCY", "EUR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("LUNARIA_CURRENCY".to_string(), e.to_string()))?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            currency,
            stripe: StripeConfig::from_env()?,
            email: EmailConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret_key = get_required_secret("STRIPE_SECRET_KEY")?;
        validate_key_prefix(&secret_key, "STRIPE_SECRET_KEY", &["sk_", "rk_"])?;
        let webhook_secret = get_required_secret("STRIPE_WEBHOOK_SECRET")?;
        validate_key_prefix(&webhook_secret, "STRIPE_WEBHOOK_SECRET", &["whsec_"])?;

        Ok(Self {
            secret_key,
            webhook_secret,
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            shipping_rates: split_list(&get_env_or_default("STRIPE_SHIPPING_RATES", "")),
            allowed_countries: split_list(&get_env_or_default("STRIPE_ALLOWED_COUNTRIES", "RO"))
                .into_iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            automatic_tax: parse_env("STRIPE_AUTOMATIC_TAX", "false")?,
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping empty entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that a Stripe key carries one of the expected prefixes.
fn validate_key_prefix(
    secret: &SecretString,
    var_name: &str,
    prefixes: &[&str],
) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if prefixes.iter().any(|p| value.starts_with(p)) && value.len() > 12 {
        return Ok(());
    }
    Err(ConfigError::InsecureSecret(
        var_name.to_string(),
        format!("expected a key starting with one of {prefixes:?}"),
    ))
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut len = 0_u32;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        len += 1;
    }
    if len == 0 {
        return 0.0;
    }

    let len = f64::from(len);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / len;
            -p * p.log2()
        })
        .sum()
}

/// Why a session secret is unfit for signing cookies, if it is.
fn check_session_secret(secret: &str) -> Result<(), String> {
    let length = secret.chars().count();
    if length < MIN_SESSION_SECRET_LENGTH {
        return Err(format!(
            "must be at least {MIN_SESSION_SECRET_LENGTH} characters (got {length})"
        ));
    }

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(format!("looks like a placeholder (contains '{pattern}')"));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(format!(
            "entropy too low ({entropy:.2} bits/char, need {MIN_ENTROPY_BITS_PER_CHAR:.1}); generate it with `openssl rand -base64 48`"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_stripe_config() -> StripeConfig {
        StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from("whsec_super_secret_signing_value"),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            shipping_rates: vec!["shr_123".to_string()],
            allowed_countries: vec!["RO".to_string()],
            automatic_tax: false,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_session_secret_rules() {
        assert!(check_session_secret("short").unwrap_err().contains("at least 32"));
        assert!(
            check_session_secret("your-session-key-here-0123456789abcdef")
                .unwrap_err()
                .contains("placeholder")
        );
        assert!(
            check_session_secret(&"a".repeat(40))
                .unwrap_err()
                .contains("entropy")
        );
        assert!(check_session_secret("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%").is_ok());
    }

    #[test]
    fn test_validate_key_prefix() {
        let key = SecretString::from("sk_live_51HxYzAbCdEf");
        assert!(validate_key_prefix(&key, "K", &["sk_", "rk_"]).is_ok());
        let wrong = SecretString::from("pk_live_51HxYzAbCdEf");
        assert!(validate_key_prefix(&wrong, "K", &["sk_", "rk_"]).is_err());
        let too_short = SecretString::from("whsec_");
        assert!(validate_key_prefix(&too_short, "K", &["whsec_"]).is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("RO, MD,,BG "), vec!["RO", "MD", "BG"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_socket_addr_and_secure() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/lunaria"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://lunaria.ro".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            currency: CurrencyCode::EUR,
            stripe: test_stripe_config(),
            email: None,
            sentry: SentryConfig::default(),
            json_logs: false,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(config.is_secure());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_stripe_config());
        assert!(debug_output.contains("shr_123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(!debug_output.contains("whsec_super_secret_signing_value"));
    }
}
