//! Payment gateway adapters
//!
//! The order flow creates a QRIS payment for a cart and gets back something
//! the customer can scan. Midtrans later reports the outcome through an HTTP
//! notification, parsed here into a [`PaymentNotification`].

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha512};
use wa_agent_config::PaymentConfig;
use wa_agent_core::money::to_whole_rupiah;
use wa_agent_core::{CartItem, Decimal};

use crate::integrations::{http_client, status_error, IntegrationError};

/// Everything needed to charge one cart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub tenant_id: String,
    /// Short tenant tag embedded in the order id
    pub tenant_short: String,
    pub customer_id: String,
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    /// Minutes until the charge expires
    pub expiry_minutes: u32,
}

/// A created payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub order_id: String,
    /// Hosted QR image, when the gateway provides one
    pub qr_url: Option<String>,
    /// Raw QRIS payload, to be rendered when no image URL is given
    pub qr_string: Option<String>,
}

/// Payment gateway trait
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentLink, IntegrationError>;

    fn name(&self) -> &'static str;
}

/// Transaction outcome reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Settled,
    Pending,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settled => "settled",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Whether the payment reached a final state
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Transaction notification posted by Midtrans
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    /// Tenant id, echoed from the charge
    #[serde(default)]
    pub custom_field1: Option<String>,
    /// Customer id, echoed from the charge
    #[serde(default)]
    pub custom_field2: Option<String>,
}

impl PaymentNotification {
    pub fn status(&self) -> PaymentStatus {
        match self.transaction_status.as_str() {
            "settlement" => PaymentStatus::Settled,
            // Card captures can still be held for fraud review
            "capture" if self.fraud_status.as_deref() != Some("challenge") => PaymentStatus::Settled,
            "expire" => PaymentStatus::Expired,
            "deny" | "cancel" | "failure" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.custom_field1.as_deref().filter(|s| !s.is_empty())
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.custom_field2.as_deref().filter(|s| !s.is_empty())
    }

    /// `signature_key` is hex SHA-512 of order id, status code, gross amount
    /// and the server key, concatenated
    pub fn verify_signature(&self, server_key: &str) -> bool {
        let mut hasher = Sha512::new();
        hasher.update(self.order_id.as_bytes());
        hasher.update(self.status_code.as_bytes());
        hasher.update(self.gross_amount.as_bytes());
        hasher.update(server_key.as_bytes());
        let expected = hex::encode(hasher.finalize());
        expected.eq_ignore_ascii_case(self.signature_key.trim())
    }
}

/// Order id of the form `<prefix>-<tenant short>-<unix millis>`
pub fn generate_order_id(prefix: &str, tenant_short: &str) -> String {
    format!("{}-{}-{}", prefix, tenant_short, Utc::now().timestamp_millis())
}

/// Midtrans Core API QRIS charge
pub struct MidtransGateway {
    config: PaymentConfig,
    server_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MidtransChargeResponse {
    status_code: Option<String>,
    status_message: Option<String>,
    order_id: Option<String>,
    #[serde(default)]
    actions: Vec<MidtransAction>,
    qr_string: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MidtransAction {
    name: String,
    url: String,
}

const QR_ACTION: &str = "generate-qr-code";
const MAX_ITEM_NAME: usize = 50;

impl MidtransGateway {
    pub fn new(config: PaymentConfig) -> Result<Self, IntegrationError> {
        let server_key = config
            .server_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| IntegrationError::AuthFailed("Midtrans server key missing".to_string()))?;
        let client = http_client(config.timeout_seconds)?;
        Ok(Self {
            config,
            server_key,
            client,
        })
    }

    fn charge_url(&self) -> String {
        format!("{}/v2/charge", self.config.base_url.trim_end_matches('/'))
    }

    /// Charge body. Item prices are whole rupiah and the gross amount is
    /// their sum, since Midtrans rejects a mismatch.
    fn charge_body(order_id: &str, request: &PaymentRequest) -> serde_json::Value {
        let item_details: Vec<serde_json::Value> = request
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.product_id,
                    "price": to_whole_rupiah(item.unit_price),
                    "quantity": item.quantity,
                    "name": item.product_name.chars().take(MAX_ITEM_NAME).collect::<String>(),
                })
            })
            .collect();

        let gross: i64 = request
            .items
            .iter()
            .map(|item| to_whole_rupiah(item.unit_price) * i64::from(item.quantity))
            .sum();

        let mut body = json!({
            "payment_type": "qris",
            "transaction_details": {
                "order_id": order_id,
                "gross_amount": gross,
            },
            "item_details": item_details,
            "qris": { "acquirer": "gopay" },
            "custom_expiry": {
                "expiry_duration": request.expiry_minutes,
                "unit": "minute",
            },
            "custom_field1": request.tenant_id,
            "custom_field2": request.customer_id,
        });

        if request.customer_name.is_some() || request.customer_phone.is_some() {
            body["customer_details"] = json!({
                "first_name": request.customer_name,
                "phone": request.customer_phone,
            });
        }

        body
    }

    fn parse_charge_response(
        order_id: &str,
        response: MidtransChargeResponse,
    ) -> Result<PaymentLink, IntegrationError> {
        let status = response.status_code.as_deref().unwrap_or("");
        if !status.starts_with('2') {
            return Err(IntegrationError::Rejected(format!(
                "Midtrans status {}: {}",
                status,
                response.status_message.unwrap_or_default()
            )));
        }

        let qr_url = response
            .actions
            .into_iter()
            .find(|a| a.name == QR_ACTION)
            .map(|a| a.url);

        if qr_url.is_none() && response.qr_string.is_none() {
            return Err(IntegrationError::InvalidResponse(
                "Charge response has neither QR action nor qr_string".to_string(),
            ));
        }

        Ok(PaymentLink {
            order_id: response.order_id.unwrap_or_else(|| order_id.to_string()),
            qr_url,
            qr_string: response.qr_string,
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentLink, IntegrationError> {
        if request.items.is_empty() || request.total <= Decimal::ZERO {
            return Err(IntegrationError::InvalidRequest(
                "Cannot charge an empty cart".to_string(),
            ));
        }

        let order_id = generate_order_id(&self.config.order_id_prefix, &request.tenant_short);
        let body = Self::charge_body(&order_id, request);

        let response = self
            .client
            .post(self.charge_url())
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: MidtransChargeResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        let link = Self::parse_charge_response(&order_id, parsed)?;
        tracing::info!(
            order_id = %link.order_id,
            tenant_id = %request.tenant_id,
            total = %request.total,
            "Midtrans QRIS charge created"
        );
        Ok(link)
    }

    fn name(&self) -> &'static str {
        "midtrans"
    }
}

/// Stub payment gateway for development/testing
///
/// Succeeds with a fake QRIS payload unless built with `failing()`.
pub struct StubPaymentGateway {
    prefix: String,
    fail: bool,
}

impl StubPaymentGateway {
    pub fn new() -> Self {
        Self {
            prefix: "STUB".to_string(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl Default for StubPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentLink, IntegrationError> {
        if self.fail {
            tracing::info!(tenant_id = %request.tenant_id, "Stub payment: simulated failure");
            return Err(IntegrationError::Rejected("stub payment failure".to_string()));
        }

        let order_id = generate_order_id(&self.prefix, &request.tenant_short);
        tracing::info!(order_id = %order_id, total = %request.total, "Stub payment: created");
        Ok(PaymentLink {
            qr_string: Some(format!("00020101021226stub{}", order_id)),
            order_id,
            qr_url: None,
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
