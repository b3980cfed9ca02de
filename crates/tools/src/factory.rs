//! Integration set construction
//!
//! Builds the gateways the order flow talks to from `Settings`. A gateway
//! whose credentials are missing falls back to its stub so development
//! setups run without external accounts.

use std::sync::Arc;

use wa_agent_config::Settings;

use crate::integrations::IntegrationError;
use crate::messaging::{FonnteGateway, MessagingGateway, StubMessagingGateway};
use crate::notifier::{BusinessNotifier, WhatsAppNotifier};
use crate::payment::{MidtransGateway, PaymentGateway, StubPaymentGateway};
use crate::qr::{QrImageRenderer, QuickChartRenderer};

/// External integrations used by the order flow
#[derive(Clone)]
pub struct Integrations {
    pub payment: Arc<dyn PaymentGateway>,
    pub messaging: Arc<dyn MessagingGateway>,
    pub qr: Arc<dyn QrImageRenderer>,
    pub notifier: Arc<dyn BusinessNotifier>,
}

impl Integrations {
    /// Create from settings
    pub fn from_settings(settings: &Settings) -> Result<Self, IntegrationError> {
        let payment: Arc<dyn PaymentGateway> = if settings.payment.server_key.is_some() {
            Arc::new(MidtransGateway::new(settings.payment.clone())?)
        } else {
            tracing::warn!("No Midtrans server key configured, using stub payment gateway");
            Arc::new(StubPaymentGateway::new())
        };

        // Tenants may carry their own device tokens, so Fonnte is used
        // whenever a base URL is configured
        let messaging: Arc<dyn MessagingGateway> = if settings.messaging.base_url.is_empty() {
            tracing::warn!("No messaging base URL configured, using stub messaging gateway");
            Arc::new(StubMessagingGateway::new())
        } else {
            Arc::new(FonnteGateway::new(settings.messaging.clone())?)
        };

        let qr: Arc<dyn QrImageRenderer> = Arc::new(QuickChartRenderer::new(settings.qr.clone()));
        let notifier: Arc<dyn BusinessNotifier> = Arc::new(WhatsAppNotifier::new(messaging.clone()));

        tracing::info!(payment = payment.name(), "Integrations initialized");

        Ok(Self {
            payment,
            messaging,
            qr,
            notifier,
        })
    }

    /// Create with stub integrations for development/testing
    pub fn with_stubs() -> Self {
        let messaging: Arc<dyn MessagingGateway> = Arc::new(StubMessagingGateway::new());
        Self::with_gateways(Arc::new(StubPaymentGateway::new()), messaging)
    }

    /// Wire the given payment and messaging gateways with the default QR
    /// renderer and a WhatsApp notifier over the same messaging gateway
    pub fn with_gateways(
        payment: Arc<dyn PaymentGateway>,
        messaging: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            payment,
            notifier: Arc::new(WhatsAppNotifier::new(messaging.clone())),
            messaging,
            qr: Arc::new(QuickChartRenderer::new(Default::default())),
        }
    }

    /// Set payment gateway
    pub fn with_payment(mut self, payment: Arc<dyn PaymentGateway>) -> Self {
        self.payment = payment;
        self
    }

    /// Set QR renderer
    pub fn with_qr(mut self, qr: Arc<dyn QrImageRenderer>) -> Self {
        self.qr = qr;
        self
    }

    /// Set business notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn BusinessNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
