//! Inbound WhatsApp messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One text message from a customer, after webhook normalisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Customer number, digits only
    pub sender: String,
    /// Tenant number the message was delivered to, digits only
    pub recipient: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

impl InboundMessage {
    pub fn new(sender: &str, recipient: &str, text: &str) -> Self {
        Self {
            sender: normalize_phone(sender),
            recipient: normalize_phone(recipient),
            text: text.to_string(),
            timestamp: Utc::now(),
            message_id: None,
            sender_name: None,
        }
    }

    pub fn with_message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }
}

/// Normalise a WhatsApp address to digits only.
///
/// Strips a `@s.whatsapp.net` style suffix and all punctuation, and rewrites a
/// local `08...` number to the `628...` international form.
pub fn normalize_phone(raw: &str) -> String {
    let local = raw.split('@').next().unwrap_or(raw);
    let digits: String = local.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('0') {
        Some(rest) if rest.starts_with('8') => format!("62{}", rest),
        _ => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("6281234567890@s.whatsapp.net"), "6281234567890");
        assert_eq!(normalize_phone("+62 812-3456-7890"), "6281234567890");
        assert_eq!(normalize_phone("081234567890"), "6281234567890");
        assert_eq!(normalize_phone("12345"), "12345");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_new_normalises_both_ends() {
        let msg = InboundMessage::new("0812 111 222", "+62 811 000", "menu");
        assert_eq!(msg.sender, "62812111222");
        assert_eq!(msg.recipient, "62811000");
    }
}
