//! Inbound WhatsApp webhook
//!
//! The gateway retries anything that is not a 2xx, so every delivery is
//! acknowledged with 200 whatever happens to it. The outcome is reported in
//! the body and in metrics only.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use wa_agent_core::{normalize_phone, InboundMessage};

use crate::metrics::record_webhook;
use crate::state::AppState;

/// Fonnte-style webhook body.
///
/// Gateways disagree on field names and types, so everything is optional and
/// loosely typed here and checked in [`WebhookPayload::into_message`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default, alias = "text")]
    pub message: Option<String>,
    /// Tenant number (Fonnte calls it `device`)
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Unix seconds, as a number or a string
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "inboxid")]
    pub id: Option<Value>,
    #[serde(default, alias = "pushname")]
    pub name: Option<String>,
}

/// What became of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed(&'static str),
    Duplicate,
    Ignored(&'static str),
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed(route) => route,
            Self::Duplicate => "duplicate",
            Self::Ignored(reason) => reason,
        }
    }
}

impl WebhookPayload {
    /// Normalised text message, or the reason the delivery is ignored
    pub fn into_message(self) -> Result<InboundMessage, &'static str> {
        if let Some(kind) = self.kind.as_deref() {
            if !kind.eq_ignore_ascii_case("text") {
                return Err("non_text");
            }
        }

        let sender = self
            .sender
            .map(|s| normalize_phone(&s))
            .filter(|s| !s.is_empty())
            .ok_or("missing_sender")?;
        let recipient = self
            .to
            .or(self.device)
            .map(|s| normalize_phone(&s))
            .filter(|s| !s.is_empty())
            .ok_or("missing_recipient")?;
        let text = self
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or("empty_message")?;

        let mut message = InboundMessage::new(&sender, &recipient, &text);
        if let Some(ts) = self.timestamp.as_ref().and_then(parse_timestamp) {
            message.timestamp = ts;
        }
        if let Some(id) = self.id.as_ref().and_then(value_to_string) {
            message = message.with_message_id(&id);
        }
        message.sender_name = self.name.filter(|n| !n.trim().is_empty());
        Ok(message)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

/// `POST /webhook`
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let outcome = process(&state, &body).await;
    record_webhook(outcome.as_str());
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "outcome": outcome.as_str(),
        })),
    )
}

async fn process(state: &AppState, body: &[u8]) -> WebhookOutcome {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return WebhookOutcome::Ignored("malformed");
        }
    };

    let message = match payload.into_message() {
        Ok(message) => message,
        Err(reason) => {
            tracing::debug!(reason, "Webhook ignored");
            return WebhookOutcome::Ignored(reason);
        }
    };

    if let Some(id) = message.message_id.as_deref() {
        if !state.dedup.first_delivery(&message.recipient, id) {
            tracing::info!(message_id = %id, sender = %message.sender, "Duplicate webhook delivery");
            return WebhookOutcome::Duplicate;
        }
    }

    let outcome = state.conversation.handle(&message).await;
    WebhookOutcome::Processed(outcome.route.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_fonnte_payload() {
        let message = payload(serde_json::json!({
            "device": "628110000000",
            "sender": "6281234567890@s.whatsapp.net",
            "message": "menu",
            "name": "Ria",
            "inboxid": 991,
            "timestamp": 1_700_000_000
        }))
        .into_message()
        .unwrap();

        assert_eq!(message.sender, "6281234567890");
        assert_eq!(message.recipient, "628110000000");
        assert_eq!(message.text, "menu");
        assert_eq!(message.message_id.as_deref(), Some("991"));
        assert_eq!(message.sender_name.as_deref(), Some("Ria"));
        assert_eq!(message.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_to_field_and_string_timestamp() {
        let message = payload(serde_json::json!({
            "sender": "0812-3456-7890",
            "to": "+62 811 0000 000",
            "text": "halo",
            "type": "text",
            "timestamp": "1700000000",
            "id": "abc"
        }))
        .into_message()
        .unwrap();

        assert_eq!(message.sender, "6281234567890");
        assert_eq!(message.recipient, "628110000000");
        assert_eq!(message.message_id.as_deref(), Some("abc"));
        assert_eq!(message.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_ignored_payloads() {
        let image = payload(serde_json::json!({
            "sender": "6281234567890", "to": "628110000000", "message": "", "type": "image"
        }));
        assert_eq!(image.into_message(), Err("non_text"));

        let no_sender = payload(serde_json::json!({ "to": "628110000000", "message": "halo" }));
        assert_eq!(no_sender.into_message(), Err("missing_sender"));

        let no_recipient = payload(serde_json::json!({ "sender": "6281234567890", "message": "halo" }));
        assert_eq!(no_recipient.into_message(), Err("missing_recipient"));

        let blank = payload(serde_json::json!({
            "sender": "6281234567890", "to": "628110000000", "message": "   "
        }));
        assert_eq!(blank.into_message(), Err("empty_message"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(WebhookOutcome::Processed("order").as_str(), "order");
        assert_eq!(WebhookOutcome::Duplicate.as_str(), "duplicate");
        assert_eq!(WebhookOutcome::Ignored("non_text").as_str(), "non_text");
    }
}
