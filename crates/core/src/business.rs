//! Tenant business profile

use serde::{Deserialize, Serialize};

/// A business using the platform, resolved from its dedicated WhatsApp number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub tenant_id: String,
    pub business_name: String,
    /// Normalised WhatsApp number the gateway delivers to (digits only)
    pub whatsapp_number: String,
    /// Gateway device token; falls back to the configured default when absent
    #[serde(default)]
    pub device_token: Option<String>,
    /// Where new-order notifications are sent
    #[serde(default)]
    pub notification_phone: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
}

impl BusinessProfile {
    pub fn new(tenant_id: &str, business_name: &str, whatsapp_number: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            business_name: business_name.to_string(),
            whatsapp_number: crate::message::normalize_phone(whatsapp_number),
            device_token: None,
            notification_phone: None,
            greeting: None,
        }
    }

    pub fn with_device_token(mut self, token: &str) -> Self {
        self.device_token = Some(token.to_string());
        self
    }

    pub fn with_notification_phone(mut self, phone: &str) -> Self {
        self.notification_phone = Some(phone.to_string());
        self
    }

    /// Greeting used when a cart is reset
    pub fn greeting_text(&self) -> String {
        self.greeting.clone().unwrap_or_else(|| {
            format!(
                "Halo! Selamat datang di {}. Ketik *menu* untuk melihat daftar menu kami.",
                self.business_name
            )
        })
    }

    /// Short tenant tag used in payment order ids
    pub fn short_id(&self) -> String {
        self.tenant_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect()
    }
}
