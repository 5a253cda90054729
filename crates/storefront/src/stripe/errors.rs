//! Payment error messages shown to shoppers.
//!
//! Stripe error and decline codes map to a short localized sentence. Unknown
//! codes fall back to a generic message; raw provider messages are never
//! shown.

/// Supported shopper-facing languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ro,
}

impl Locale {
    /// Pick the first supported language from an `Accept-Language` header,
    /// honoring q-values.
    #[must_use]
    pub fn from_accept_language(header: &str) -> Self {
        let mut ranked: Vec<(f32, &str)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.trim().split(';');
                let tag = parts.next()?.trim();
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((quality, tag))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        ranked
            .into_iter()
            .find_map(|(_, tag)| Self::from_tag(tag))
            .unwrap_or_default()
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split('-').next()?.to_ascii_lowercase();
        match primary.as_str() {
            "ro" => Some(Self::Ro),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Locale code for the hosted checkout page.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ro => "ro",
        }
    }
}

/// `(code, english, romanian)`
const MESSAGES: &[(&str, &str, &str)] = &[
    (
        "card_declined",
        "Your card was declined.",
        "Cardul dumneavoastră a fost refuzat.",
    ),
    (
        "expired_card",
        "Your card has expired.",
        "Cardul dumneavoastră a expirat.",
    ),
    (
        "incorrect_cvc",
        "Your card's security code is incorrect.",
        "Codul de securitate al cardului este incorect.",
    ),
    (
        "incorrect_number",
        "Your card number is incorrect.",
        "Numărul cardului este incorect.",
    ),
    (
        "processing_error",
        "An error occurred while processing your card. Please try again.",
        "A apărut o eroare la procesarea cardului. Vă rugăm să încercați din nou.",
    ),
    (
        "insufficient_funds",
        "Your card has insufficient funds.",
        "Fonduri insuficiente pe card.",
    ),
    (
        "amount_too_small",
        "The order total is below the minimum amount allowed.",
        "Totalul comenzii este sub suma minimă permisă.",
    ),
    (
        "amount_too_large",
        "The order total exceeds the maximum amount allowed.",
        "Totalul comenzii depășește suma maximă permisă.",
    ),
    (
        "authentication_required",
        "Your bank requires additional authentication for this payment.",
        "Banca dumneavoastră solicită autentificare suplimentară pentru această plată.",
    ),
    (
        "rate_limit",
        "Too many payment attempts. Please wait a moment and try again.",
        "Prea multe încercări de plată. Vă rugăm să așteptați și să încercați din nou.",
    ),
];

const GENERIC: (&str, &str) = (
    "We could not process your payment. Please try again.",
    "Nu am putut procesa plata. Vă rugăm să încercați din nou.",
);

/// Localized message for a provider error code.
#[must_use]
pub fn payment_error_message(code: Option<&str>, locale: Locale) -> &'static str {
    let (en, ro) = code
        .and_then(|code| MESSAGES.iter().find(|(c, _, _)| *c == code))
        .map_or(GENERIC, |(_, en, ro)| (*en, *ro));

    match locale {
        Locale::En => en,
        Locale::Ro => ro,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_is_localized() {
        assert_eq!(
            payment_error_message(Some("card_declined"), Locale::En),
            "Your card was declined."
        );
        assert_eq!(
            payment_error_message(Some("card_declined"), Locale::Ro),
            "Cardul dumneavoastră a fost refuzat."
        );
    }

    #[test]
    fn test_unknown_or_missing_code_falls_back() {
        assert_eq!(payment_error_message(Some("no_such_code"), Locale::En), GENERIC.0);
        assert_eq!(payment_error_message(None, Locale::Ro), GENERIC.1);
    }

    #[test]
    fn test_accept_language() {
        assert_eq!(Locale::from_accept_language("ro-RO,ro;q=0.9,en;q=0.8"), Locale::Ro);
        assert_eq!(Locale::from_accept_language("en-US,en;q=0.9"), Locale::En);
        assert_eq!(Locale::from_accept_language("fr-FR,ro;q=0.5,en;q=0.7"), Locale::En);
        assert_eq!(Locale::from_accept_language("de"), Locale::En);
        assert_eq!(Locale::from_accept_language(""), Locale::En);
    }

    #[test]
    fn test_every_code_has_both_languages() {
        for (code, en, ro) in MESSAGES {
            assert!(!en.is_empty() && !ro.is_empty(), "{code} is missing a translation");
        }
    }
}
