//! External service adapters for the ordering agent
//!
//! Each concern sits behind a trait with a real HTTP adapter and a stub:
//! - `payment`: QRIS charge creation (Midtrans)
//! - `qr`: QR payload to image URL (QuickChart)
//! - `messaging`: outbound WhatsApp (Fonnte)
//! - `notifier`: new-order notification to the business

pub mod factory;
pub mod integrations;
pub mod messaging;
pub mod notifier;
pub mod payment;
pub mod qr;

pub use factory::Integrations;
pub use integrations::IntegrationError;
pub use messaging::{FonnteGateway, MessagingGateway, SentMessage, StubMessagingGateway};
pub use notifier::{order_notification_text, BusinessNotifier, WhatsAppNotifier};
pub use payment::{
    generate_order_id, MidtransGateway, PaymentGateway, PaymentLink, PaymentNotification,
    PaymentRequest, PaymentStatus, StubPaymentGateway,
};
pub use qr::{QrImageRenderer, QuickChartRenderer};
