//! Webhook signature verification.
//!
//! Stripe signs each delivery with
//! `Stripe-Signature: t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`,
//! where the HMAC-SHA256 is computed over `"{t}.{raw body}"` with the
//! endpoint's signing secret. Several `v1` entries appear while a secret is
//! being rolled; any one matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use super::types::Event;

/// Maximum age (and clock skew) accepted for a signed delivery.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Why a delivery failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    MalformedHeader,
    #[error("no v1 signature in header")]
    NoSignatures,
    #[error("timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid signing secret")]
    InvalidSecret,
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            "v1" => signatures.push(value),
            // v0 and future schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

/// Compute the hex `v1` signature of a payload.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidSecret`] if the HMAC cannot be keyed.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a delivery's signature header against the raw body.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    // The timestamp is unauthenticated here; abs_diff cannot overflow.
    if now.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;
    if !parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        return Err(SignatureError::Mismatch);
    }

    debug!("Stripe signature verified");
    Ok(())
}

/// Parse a verified payload into an event.
///
/// # Errors
///
/// Returns the JSON error if the body is not a Stripe event.
pub fn parse_event(payload: &[u8]) -> Result<Event, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;

    fn header_for(timestamp: i64, payload: &[u8]) -> String {
        format!("t={timestamp},v1={}", compute_signature(SECRET, timestamp, payload).unwrap())
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_valid_signature() {
        let header = header_for(NOW, BODY);
        assert_eq!(verify_signature(BODY, &header, SECRET, NOW + 10, DEFAULT_TOLERANCE_SECS), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = compute_signature(SECRET, NOW, BODY).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={good}");
        assert!(verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_modified_payload_fails() {
        let header = header_for(NOW, BODY);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_2"}}}"#;
        assert_eq!(
            verify_signature(tampered, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_fails() {
        let header = header_for(NOW, BODY);
        assert_eq!(
            verify_signature(BODY, &header, "whsec_other", NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_old_timestamp_fails() {
        let header = header_for(NOW - 600, BODY);
        assert_eq!(
            verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1=00");
            assert_eq!(
                verify_signature(b"{}", &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::TimestampOutOfTolerance)
            );
        }
        let header = header_for(NOW, BODY);
        assert_eq!(
            verify_signature(BODY, &header, SECRET, i64::MIN, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(BODY, "v1=abc", SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(BODY, &format!("t={NOW}"), SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::NoSignatures)
        );
        assert_eq!(
            verify_signature(BODY, "garbage", SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(BODY, "t=abc,v1=00", SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn test_parse_event() {
        let event = parse_event(BODY).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.object_id(), Some("cs_1"));
    }
}
