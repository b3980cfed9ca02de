//! Customer detail extraction
//!
//! Pulls name, phone, outlet preference and delivery method out of a free-text
//! reply. Each heuristic runs independently, so any subset may match. Fields
//! that are not found stay `None`; the caller merges the result onto the cart
//! without overwriting known values.
//!
//! Static patterns are compiled once using `once_cell::sync::Lazy`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use wa_agent_core::{CartPatch, DeliveryMethod};

// Indonesian mobile numbers: 0 / 62 / +62, then 8, then 8-13 digits
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d+])((?:\+62|62|0)[\s.\-]?8(?:[\s.\-]?\d){8,13})").unwrap()
});

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:nama|saya|aku))\s*:?\s+(?:(?i:saya|aku|adalah)\s+)?([A-Z][a-zA-Z']*(?:\s+[A-Z][a-zA-Z']*)*)",
    )
    .unwrap()
});

static OUTLET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:outlet|cabang))\s*:?\s+(?:(?i:di)\s+)?([\p{L}\d][\p{L}\d'\-]*(?:\s+[A-Z][\p{L}\d'\-]*)*)",
    )
    .unwrap()
});

/// Words that are never part of a name or an outlet
const STOPWORDS: &[&str] = &[
    "nama", "saya", "aku", "adalah", "hp", "no", "nomor", "nomer", "telp", "telepon", "wa",
    "outlet", "cabang", "ambil", "sendiri", "pickup", "delivery", "antar", "diantar", "kirim",
    "ya", "iya", "ok", "oke", "mau", "pesan", "lanjut", "selesai", "batal", "terima", "kasih",
    "halo", "hai", "di", "dan", "kak", "mas", "mbak",
];

const DELIVERY_KEYWORDS: &[&str] = &["antar", "deliver", "kirim"];
const PICKUP_KEYWORDS: &[&str] = &["ambil", "pickup", "pick up", "takeaway", "take away"];

/// Longest message (in words) whose bare capitalised token may name an outlet
const BARE_OUTLET_MAX_WORDS: usize = 3;

/// Details found in one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub outlet: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
}

impl CustomerDetails {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.outlet.is_none()
            && self.delivery_method.is_none()
    }

    /// Number of fields found
    pub fn found_count(&self) -> usize {
        [
            self.name.is_some(),
            self.phone.is_some(),
            self.outlet.is_some(),
            self.delivery_method.is_some(),
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }
}

impl From<CustomerDetails> for CartPatch {
    fn from(details: CustomerDetails) -> Self {
        CartPatch {
            customer_name: details.name,
            phone_number: details.phone,
            outlet_preference: details.outlet,
            delivery_method: details.delivery_method,
            ..Default::default()
        }
    }
}

/// Regex heuristics for customer details
#[derive(Debug, Clone, Default)]
pub struct CustomerDetailParser;

impl CustomerDetailParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, message: &str) -> CustomerDetails {
        let name = self.extract_name(message);
        let outlet = self
            .extract_outlet(message)
            .or_else(|| self.extract_bare_outlet(message, name.as_deref()));

        CustomerDetails {
            phone: self.extract_phone(message),
            outlet,
            delivery_method: self.extract_delivery_method(message),
            name,
        }
    }

    /// Phone number, digits only (a leading `+` is dropped)
    pub fn extract_phone(&self, text: &str) -> Option<String> {
        PHONE_PATTERN.captures_iter(text).find_map(|caps| {
            let digits: String = caps
                .get(1)?
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            (10..=16).contains(&digits.len()).then_some(digits)
        })
    }

    pub fn extract_name(&self, text: &str) -> Option<String> {
        NAME_PATTERN
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| leading_content_words(m.as_str()))
    }

    pub fn extract_outlet(&self, text: &str) -> Option<String> {
        OUTLET_PATTERN
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| leading_content_words(m.as_str()))
    }

    /// A short reply like "Palagan" names the outlet on its own
    fn extract_bare_outlet(&self, text: &str, name: Option<&str>) -> Option<String> {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() || tokens.len() > BARE_OUTLET_MAX_WORDS {
            return None;
        }

        let name_words: Vec<String> = name
            .map(|n| n.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default();

        let is_candidate = |t: &&str| {
            t.chars().next().is_some_and(char::is_uppercase)
                && !is_stopword(t)
                && !name_words.contains(&t.to_lowercase())
        };

        let start = tokens.iter().position(|t| is_candidate(t))?;
        let run: Vec<&str> = tokens[start..]
            .iter()
            .take_while(|t| is_candidate(*t))
            .copied()
            .collect();
        Some(run.join(" "))
    }

    /// Delivery keywords are checked before pickup keywords
    pub fn extract_delivery_method(&self, text: &str) -> Option<DeliveryMethod> {
        let lower = text.to_lowercase();
        if DELIVERY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Some(DeliveryMethod::Delivery)
        } else if PICKUP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Some(DeliveryMethod::Pickup)
        } else {
            None
        }
    }
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Words up to the first stopword; `None` if that leaves nothing
fn leading_content_words(captured: &str) -> Option<String> {
    let words: Vec<&str> = captured
        .split_whitespace()
        .take_while(|w| !is_stopword(w))
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fields_in_one_message() {
        let parser = CustomerDetailParser::new();
        let details =
            parser.parse("Nama saya Ria, HP 081234567890, outlet Palagan, ambil sendiri");

        assert_eq!(details.name.as_deref(), Some("Ria"));
        assert_eq!(details.phone.as_deref(), Some("081234567890"));
        assert_eq!(details.outlet.as_deref(), Some("Palagan"));
        assert_eq!(details.delivery_method, Some(DeliveryMethod::Pickup));
        assert_eq!(details.found_count(), 4);
    }

    #[test]
    fn test_phone_formats() {
        let parser = CustomerDetailParser::new();
        assert_eq!(
            parser.extract_phone("wa saya +62 812-3456-7890").as_deref(),
            Some("6281234567890")
        );
        assert_eq!(
            parser.extract_phone("hp: 0812.3456.789").as_deref(),
            Some("08123456789")
        );
        assert_eq!(parser.extract_phone("no 12345"), None);
        assert_eq!(parser.extract_phone("harga 50000"), None);
    }

    #[test]
    fn test_name_patterns() {
        let parser = CustomerDetailParser::new();
        assert_eq!(parser.extract_name("aku Budi Santoso").as_deref(), Some("Budi Santoso"));
        assert_eq!(parser.extract_name("nama: Dewi").as_deref(), Some("Dewi"));
        assert_eq!(parser.extract_name("Nama saya Ria HP 0812").as_deref(), Some("Ria"));
        assert_eq!(parser.extract_name("saya mau pesan lagi"), None);
        assert_eq!(parser.extract_name("Saya Mau ambil"), None);
    }

    #[test]
    fn test_outlet_patterns() {
        let parser = CustomerDetailParser::new();
        assert_eq!(parser.extract_outlet("cabang Jakal ya").as_deref(), Some("Jakal"));
        assert_eq!(
            parser.extract_outlet("outlet di Seturan Raya").as_deref(),
            Some("Seturan Raya")
        );
        assert_eq!(parser.extract_outlet("outlet ambil"), None);
    }

    #[test]
    fn test_bare_outlet_token() {
        let parser = CustomerDetailParser::new();
        let details = parser.parse("Palagan");
        assert_eq!(details.outlet.as_deref(), Some("Palagan"));

        let details = parser.parse("Ok Kaliurang");
        assert_eq!(details.outlet.as_deref(), Some("Kaliurang"));

        // Long messages never fall back to a bare token
        let details = parser.parse("Besok saya ke sana jam tujuh");
        assert_eq!(details.outlet, None);
    }

    #[test]
    fn test_bare_outlet_excludes_name() {
        let parser = CustomerDetailParser::new();
        let details = parser.parse("saya Ria");
        assert_eq!(details.name.as_deref(), Some("Ria"));
        assert_eq!(details.outlet, None);
    }

    #[test]
    fn test_delivery_method() {
        let parser = CustomerDetailParser::new();
        assert_eq!(
            parser.extract_delivery_method("tolong diantar ya"),
            Some(DeliveryMethod::Delivery)
        );
        assert_eq!(
            parser.extract_delivery_method("Delivery aja"),
            Some(DeliveryMethod::Delivery)
        );
        assert_eq!(
            parser.extract_delivery_method("saya ambil di toko"),
            Some(DeliveryMethod::Pickup)
        );
        assert_eq!(parser.extract_delivery_method("terima kasih"), None);
    }

    #[test]
    fn test_nothing_found() {
        let parser = CustomerDetailParser::new();
        let details = parser.parse("kapan bisa siap?");
        assert!(details.is_empty());
    }

    #[test]
    fn test_into_patch() {
        let parser = CustomerDetailParser::new();
        let patch: CartPatch = parser.parse("HP 081234567890").into();
        assert_eq!(patch.phone_number.as_deref(), Some("081234567890"));
        assert!(patch.customer_name.is_none());
        assert!(patch.step.is_none());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = CustomerDetailParser::new();
        let msg = "aku Andi, 0857 1111 2222, cabang Seturan, kirim";
        assert_eq!(parser.parse(msg), parser.parse(msg));
    }
}
