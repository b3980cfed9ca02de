//! Business notification on new orders

use async_trait::async_trait;
use std::sync::Arc;
use wa_agent_core::{format_rupiah, BusinessProfile, Cart};

use crate::integrations::IntegrationError;
use crate::messaging::MessagingGateway;

/// Tells the business about an order waiting for payment.
///
/// Callers treat failures as non-fatal.
#[async_trait]
pub trait BusinessNotifier: Send + Sync {
    async fn notify_new_order(
        &self,
        order_id: &str,
        cart: &Cart,
        profile: &BusinessProfile,
    ) -> Result<(), IntegrationError>;
}

/// Sends the notification as a WhatsApp message to the tenant's
/// `notification_phone`
pub struct WhatsAppNotifier {
    messaging: Arc<dyn MessagingGateway>,
}

impl WhatsAppNotifier {
    pub fn new(messaging: Arc<dyn MessagingGateway>) -> Self {
        Self { messaging }
    }
}

/// Notification text sent to the business
pub fn order_notification_text(order_id: &str, cart: &Cart) -> String {
    let mut text = format!("🛎️ *Pesanan Baru*\nNo. Order: {}\n\n", order_id);
    for item in cart.items() {
        text.push_str(&format!(
            "• {} x{} = {}\n",
            item.product_name,
            item.quantity,
            format_rupiah(item.subtotal())
        ));
    }
    text.push_str(&format!("\n*Total: {}*\n\n", format_rupiah(cart.total_amount())));
    text.push_str(&format!(
        "Nama: {}\nHP: {}\nOutlet: {}\nPengambilan: {}\n\nStatus: menunggu pembayaran",
        cart.customer_name.as_deref().unwrap_or("-"),
        cart.phone_number.as_deref().unwrap_or(&cart.customer_id),
        cart.outlet_preference.as_deref().unwrap_or("-"),
        cart.delivery_method.map(|m| m.label()).unwrap_or("-"),
    ));
    text
}

#[async_trait]
impl BusinessNotifier for WhatsAppNotifier {
    async fn notify_new_order(
        &self,
        order_id: &str,
        cart: &Cart,
        profile: &BusinessProfile,
    ) -> Result<(), IntegrationError> {
        let Some(target) = profile.notification_phone.as_deref().filter(|p| !p.is_empty()) else {
            tracing::debug!(tenant_id = %profile.tenant_id, "No notification phone, skipping");
            return Ok(());
        };

        self.messaging
            .send(
                target,
                &order_notification_text(order_id, cart),
                profile.device_token.as_deref(),
            )
            .await?;

        tracing::info!(tenant_id = %profile.tenant_id, order_id = %order_id, "Business notified of new order");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::StubMessagingGateway;
    use wa_agent_core::{DeliveryMethod, ParsedOrderItem, Decimal};

    fn cart() -> Cart {
        let mut cart = Cart::new("t1", "6281234567890");
        cart.merge_items(&[ParsedOrderItem {
            product_id: "p1".to_string(),
            product_name: "Salmon Roll".to_string(),
            quantity: 2,
            price: Decimal::from(50_000),
        }]);
        cart.customer_name = Some("Ria".to_string());
        cart.delivery_method = Some(DeliveryMethod::Pickup);
        cart
    }

    #[test]
    fn test_notification_text() {
        let text = order_notification_text("ORDER-t1-1", &cart());
        assert!(text.contains("ORDER-t1-1"));
        assert!(text.contains("Salmon Roll x2 = Rp 100.000"));
        assert!(text.contains("Total: Rp 100.000"));
        assert!(text.contains("Nama: Ria"));
        assert!(text.contains("HP: 6281234567890"));
        assert!(text.contains("Ambil sendiri"));
    }

    #[tokio::test]
    async fn test_sends_to_notification_phone_only() {
        let stub = Arc::new(StubMessagingGateway::new());
        let notifier = WhatsAppNotifier::new(stub.clone());

        let profile = BusinessProfile::new("t1", "Sushi Yuk", "62811000");
        notifier.notify_new_order("O-1", &cart(), &profile).await.unwrap();
        assert!(stub.sent().is_empty());

        let profile = profile.with_notification_phone("62822000");
        notifier.notify_new_order("O-1", &cart(), &profile).await.unwrap();
        assert_eq!(stub.sent_to("62822000").len(), 1);
    }
}
