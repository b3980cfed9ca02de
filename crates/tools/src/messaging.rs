//! WhatsApp messaging gateway adapters

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wa_agent_config::MessagingConfig;

use crate::integrations::{http_client, status_error, IntegrationError};

/// Outbound WhatsApp messaging
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a text message. `device_token` overrides the configured default.
    async fn send(
        &self,
        to: &str,
        text: &str,
        device_token: Option<&str>,
    ) -> Result<(), IntegrationError>;

    /// Send a text message with an attached image
    async fn send_with_image(
        &self,
        to: &str,
        text: &str,
        image_url: &str,
        device_token: Option<&str>,
    ) -> Result<(), IntegrationError>;
}

/// Fonnte gateway
pub struct FonnteGateway {
    config: MessagingConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FonnteResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    reason: Option<String>,
}

impl FonnteGateway {
    pub fn new(config: MessagingConfig) -> Result<Self, IntegrationError> {
        let client = http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    fn send_url(&self) -> String {
        format!("{}/send", self.config.base_url.trim_end_matches('/'))
    }

    fn token<'a>(&'a self, device_token: Option<&'a str>) -> Result<&'a str, IntegrationError> {
        device_token
            .filter(|t| !t.is_empty())
            .or(self.config.device_token.as_deref().filter(|t| !t.is_empty()))
            .ok_or_else(|| IntegrationError::AuthFailed("No Fonnte device token".to_string()))
    }

    async fn post(
        &self,
        form: &[(&str, &str)],
        device_token: Option<&str>,
    ) -> Result<(), IntegrationError> {
        let token = self.token(device_token)?;

        let response = self
            .client
            .post(self.send_url())
            .header(reqwest::header::AUTHORIZATION, token)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        Self::check_body(&body)
    }

    /// Fonnte answers 200 with `{"status": false}` on logical failures
    fn check_body(body: &str) -> Result<(), IntegrationError> {
        let parsed: FonnteResponse = serde_json::from_str(body)
            .map_err(|e| IntegrationError::InvalidResponse(format!("Fonnte response: {}", e)))?;
        if parsed.status {
            Ok(())
        } else {
            Err(IntegrationError::Rejected(
                parsed.reason.unwrap_or_else(|| "unknown reason".to_string()),
            ))
        }
    }
}

#[async_trait]
impl MessagingGateway for FonnteGateway {
    async fn send(
        &self,
        to: &str,
        text: &str,
        device_token: Option<&str>,
    ) -> Result<(), IntegrationError> {
        self.post(
            &[("target", to), ("message", text), ("countryCode", "62")],
            device_token,
        )
        .await?;
        tracing::debug!(to = %to, "WhatsApp message sent");
        Ok(())
    }

    async fn send_with_image(
        &self,
        to: &str,
        text: &str,
        image_url: &str,
        device_token: Option<&str>,
    ) -> Result<(), IntegrationError> {
        self.post(
            &[
                ("target", to),
                ("message", text),
                ("url", image_url),
                ("countryCode", "62"),
            ],
            device_token,
        )
        .await?;
        tracing::debug!(to = %to, "WhatsApp image message sent");
        Ok(())
    }
}

/// A message handed to the stub gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
    pub image_url: Option<String>,
}

/// Stub messaging gateway for development/testing
///
/// Records every message instead of sending it. Individual send kinds can be
/// made to fail to exercise fallbacks.
#[derive(Default)]
pub struct StubMessagingGateway {
    sent: Mutex<Vec<SentMessage>>,
    fail_text: bool,
    fail_image: bool,
}

impl StubMessagingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_images(mut self) -> Self {
        self.fail_image = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.fail_text = true;
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<SentMessage> {
        self.sent.lock().iter().filter(|m| m.to == to).cloned().collect()
    }
}

#[async_trait]
impl MessagingGateway for StubMessagingGateway {
    async fn send(
        &self,
        to: &str,
        text: &str,
        _device_token: Option<&str>,
    ) -> Result<(), IntegrationError> {
        if self.fail_text {
            return Err(IntegrationError::ConnectionFailed("stub text failure".to_string()));
        }
        tracing::info!(to = %to, "Stub messaging: text");
        self.sent.lock().push(SentMessage {
            to: to.to_string(),
            text: text.to_string(),
            image_url: None,
        });
        Ok(())
    }

    async fn send_with_image(
        &self,
        to: &str,
        text: &str,
        image_url: &str,
        _device_token: Option<&str>,
    ) -> Result<(), IntegrationError> {
        if self.fail_image {
            return Err(IntegrationError::ConnectionFailed("stub image failure".to_string()));
        }
        tracing::info!(to = %to, image_url = %image_url, "Stub messaging: image");
        self.sent.lock().push(SentMessage {
            to: to.to_string(),
            text: text.to_string(),
            image_url: Some(image_url.to_string()),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_body() {
        assert!(FonnteGateway::check_body(r#"{"status":true,"detail":"success"}"#).is_ok());

        let err = FonnteGateway::check_body(r#"{"status":false,"reason":"invalid token"}"#)
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Rejected(r) if r == "invalid token"));

        assert!(matches!(
            FonnteGateway::check_body("<html>"),
            Err(IntegrationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_token_resolution() {
        let gateway = FonnteGateway::new(MessagingConfig {
            device_token: Some("default-token".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(gateway.token(None).unwrap(), "default-token");
        assert_eq!(gateway.token(Some("tenant-token")).unwrap(), "tenant-token");
        assert_eq!(gateway.token(Some("")).unwrap(), "default-token");

        let gateway = FonnteGateway::new(MessagingConfig::default()).unwrap();
        assert!(gateway.token(None).is_err());
    }

    #[tokio::test]
    async fn test_stub_records_and_fails_on_demand() {
        let stub = StubMessagingGateway::new().failing_images();
        stub.send("62811", "halo", None).await.unwrap();
        assert!(stub
            .send_with_image("62811", "qr", "https://x/qr.png", None)
            .await
            .is_err());

        let sent = stub.sent_to("62811");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "halo");
        assert!(sent[0].image_url.is_none());
    }
}
