//! Order state machine
//!
//! One call to [`OrderFlow::handle`] consumes one customer message: it loads
//! (or lazily creates) the customer's open cart, decides the next step from
//! the cart's current step and the message, persists the change and produces
//! the reply.
//!
//! Steps only move forward in the documented order:
//!
//! ```text
//! browsing -> collecting_items -> collecting_details -> confirming_order -> awaiting_payment
//! ```
//!
//! Cancellation (`batal`), a failed payment, or a declined confirmation
//! closes the cart (`completed`) from any step. A cart whose stored step
//! cannot be read is reset to `browsing`.
//!
//! An `awaiting_payment` cart closes when the gateway reports the payment
//! through [`OrderFlow::settle_payment`], or on the customer's next message
//! once the charge has expired.
//!
//! Every branch resolves to an [`OrderReply`]. Store failures are retried
//! once against a freshly loaded cart and then reported as
//! [`OrderReply::Bypass`] so the caller can fall back to the general reply
//! path.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use unicode_segmentation::UnicodeSegmentation;
use wa_agent_config::OrderingConfig;
use wa_agent_core::{BusinessProfile, Cart, CartPatch, CartStep, InboundMessage, Product};
use wa_agent_persistence::{CartStore, PersistenceError, ProductCatalog};
use wa_agent_text_processing::{CustomerDetailParser, Intent, IntentClassifier, OrderItemParser};
use wa_agent_tools::{Integrations, PaymentLink, PaymentRequest, PaymentStatus};

use crate::formatter::ResponseFormatter;
use crate::locks::CustomerLocks;
use crate::validator::OrderValidator;
use crate::AgentError;

const CANCEL_WORDS: &[&str] = &["batal", "batalkan", "cancel", "ulang", "ulangi"];
const CHECKOUT_WORDS: &[&str] = &["selesai", "lanjut", "checkout", "cukup"];
const AFFIRM_WORDS: &[&str] = &[
    "ya", "iya", "y", "yes", "benar", "betul", "lanjut", "bayar", "ok", "oke", "okay", "setuju",
];
/// Refusals win over affirmations; "ya" also closes many refusals
const NEGATION_WORDS: &[&str] = &[
    "tidak", "tdk", "gak", "gk", "ga", "nggak", "ngga", "enggak", "engga", "belum", "blm",
    "jangan", "no", "nope", "nanti",
];

/// Outcome of one message through the order flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderReply {
    /// Reply text for the caller to send
    Text(String),
    /// The flow already messaged the customer directly
    Delivered,
    /// Not an ordering conversation; the caller answers through the
    /// knowledge path
    NotOrdering,
    /// The cart store is unavailable; ordering was skipped entirely
    Bypass,
}

impl OrderReply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// What a payment notification did to the customer's cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Paid; the cart is completed with its items kept
    Paid,
    /// Failed or expired; the cart is cleared
    Closed,
    /// No awaiting cart matches the order, or the payment is still pending
    Ignored,
}

impl Settlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Closed => "closed",
            Self::Ignored => "ignored",
        }
    }
}

fn message_words(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

fn contains_any(words: &HashSet<String>, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| words.contains(*k))
}

fn is_affirmation(words: &HashSet<String>) -> bool {
    contains_any(words, AFFIRM_WORDS) && !contains_any(words, NEGATION_WORDS)
}

/// The order-taking state machine
pub struct OrderFlow {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    integrations: Integrations,
    intents: IntentClassifier,
    items: OrderItemParser,
    details: CustomerDetailParser,
    validator: OrderValidator,
    formatter: ResponseFormatter,
    locks: CustomerLocks,
    payment_expiry: Duration,
}

impl OrderFlow {
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
        integrations: Integrations,
        config: &OrderingConfig,
    ) -> Self {
        Self {
            carts,
            catalog,
            integrations,
            intents: IntentClassifier::new(),
            items: OrderItemParser::new(config.max_item_quantity),
            details: CustomerDetailParser::new(),
            validator: OrderValidator::new(),
            formatter: ResponseFormatter::new(config.fallback_menu.clone()),
            locks: CustomerLocks::new(),
            payment_expiry: Duration::minutes(i64::from(config.payment_expiry_minutes)),
        }
    }

    pub fn formatter(&self) -> &ResponseFormatter {
        &self.formatter
    }

    pub fn locks(&self) -> &CustomerLocks {
        &self.locks
    }

    /// Process one customer message
    pub async fn handle(&self, profile: &BusinessProfile, message: &InboundMessage) -> OrderReply {
        let tenant_id = profile.tenant_id.as_str();
        let customer = message.sender.as_str();
        let _guard = self.locks.acquire(tenant_id, customer).await;

        let mut retried = false;
        loop {
            let Some(cart) = self.load_or_create(tenant_id, customer).await else {
                counter!("order_flow_bypass_total", "reason" => "load").increment(1);
                return OrderReply::Bypass;
            };

            match self.step(profile, message, cart).await {
                Ok(reply) => return reply,
                Err(e) if e.is_transient() && !retried => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        customer = %customer,
                        error = %e,
                        "Cart write failed, retrying with a fresh cart"
                    );
                    retried = true;
                }
                Err(e) => {
                    tracing::error!(
                        tenant_id = %tenant_id,
                        customer = %customer,
                        error = %e,
                        "Order flow failed, bypassing ordering"
                    );
                    counter!("order_flow_bypass_total", "reason" => "write").increment(1);
                    return OrderReply::Bypass;
                }
            }
        }
    }

    /// Apply a gateway payment outcome to the customer's awaiting cart
    pub async fn settle_payment(
        &self,
        tenant_id: &str,
        customer: &str,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<Settlement, AgentError> {
        let _guard = self.locks.acquire(tenant_id, customer).await;

        let cart = match self.carts.find_open(tenant_id, customer).await? {
            Some(cart)
                if cart.step == CartStep::AwaitingPayment
                    && cart.order_id.as_deref() == Some(order_id) =>
            {
                cart
            }
            other => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    customer = %customer,
                    order_id = %order_id,
                    open_step = ?other.map(|c| c.step),
                    "Payment notification matches no awaiting cart"
                );
                return Ok(Settlement::Ignored);
            }
        };

        match status {
            PaymentStatus::Pending => Ok(Settlement::Ignored),
            PaymentStatus::Settled => {
                self.transition(&cart, CartPatch::step(CartStep::Completed))
                    .await?;
                counter!("orders_paid_total").increment(1);
                tracing::info!(tenant_id = %tenant_id, customer = %customer, order_id = %order_id, total = %cart.total_amount(), "Order paid");
                Ok(Settlement::Paid)
            }
            PaymentStatus::Failed | PaymentStatus::Expired => {
                self.carts.clear(tenant_id, customer).await?;
                counter!("orders_cancelled_total", "reason" => status.as_str()).increment(1);
                tracing::info!(tenant_id = %tenant_id, customer = %customer, order_id = %order_id, status = status.as_str(), "Unpaid order closed");
                Ok(Settlement::Closed)
            }
        }
    }

    /// Open cart of the customer, created when missing. A failed lookup or
    /// creation is retried once with a fresh cart.
    async fn load_or_create(&self, tenant_id: &str, customer: &str) -> Option<Cart> {
        let first = match self.carts.find_open(tenant_id, customer).await {
            Ok(Some(cart)) => return Some(cart),
            Ok(None) => self.carts.create(tenant_id, customer).await,
            Err(e) => Err(e),
        };

        match first {
            Ok(cart) => {
                tracing::debug!(tenant_id = %tenant_id, customer = %customer, cart_id = %cart.id, "Created cart");
                Some(cart)
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, customer = %customer, error = %e, "Cart load failed, creating a fresh cart");
                match self.carts.create(tenant_id, customer).await {
                    Ok(cart) => Some(cart),
                    // The open cart exists after all
                    Err(PersistenceError::Conflict(_)) => {
                        self.carts.find_open(tenant_id, customer).await.ok().flatten()
                    }
                    Err(e) => {
                        tracing::error!(tenant_id = %tenant_id, customer = %customer, error = %e, "Cart creation failed");
                        None
                    }
                }
            }
        }
    }

    async fn step(
        &self,
        profile: &BusinessProfile,
        message: &InboundMessage,
        cart: Cart,
    ) -> Result<OrderReply, AgentError> {
        let text = message.text.trim();
        let words = message_words(text);

        if cart.step == CartStep::AwaitingPayment && self.payment_expired(&cart) {
            return self.restart_after_expiry(profile, text, &cart).await;
        }

        if contains_any(&words, CANCEL_WORDS) {
            return self.cancel(&cart, "customer").await;
        }

        tracing::debug!(tenant_id = %cart.tenant_id, customer = %cart.customer_id, step = %cart.step, "Order step");

        match cart.step {
            CartStep::Browsing => self.on_browsing(profile, text, cart).await,
            CartStep::CollectingItems => self.on_collecting_items(profile, text, &words, cart).await,
            CartStep::CollectingDetails => self.on_collecting_details(text, cart).await,
            CartStep::ConfirmingOrder => {
                if is_affirmation(&words) {
                    self.checkout(profile, cart).await
                } else {
                    self.cancel(&cart, "declined").await
                }
            }
            CartStep::AwaitingPayment => Ok(OrderReply::Text(self.formatter.awaiting_payment())),
            CartStep::Unknown => {
                tracing::warn!(tenant_id = %cart.tenant_id, customer = %cart.customer_id, cart_id = %cart.id, "Unreadable cart step, resetting");
                self.transition(&cart, CartPatch::step(CartStep::Browsing).with_items(Vec::new()))
                    .await?;
                Ok(OrderReply::Text(self.formatter.greeting(profile)))
            }
            // find_open never returns a completed cart
            CartStep::Completed => Ok(OrderReply::NotOrdering),
        }
    }

    fn payment_expired(&self, cart: &Cart) -> bool {
        Utc::now() - cart.updated_at > self.payment_expiry
    }

    /// Close an expired unpaid cart, then treat the message as the start of
    /// a new order
    async fn restart_after_expiry(
        &self,
        profile: &BusinessProfile,
        text: &str,
        cart: &Cart,
    ) -> Result<OrderReply, AgentError> {
        self.carts.clear(&cart.tenant_id, &cart.customer_id).await?;
        counter!("orders_cancelled_total", "reason" => "expired").increment(1);
        tracing::info!(
            tenant_id = %cart.tenant_id,
            customer = %cart.customer_id,
            order_id = cart.order_id.as_deref().unwrap_or(""),
            "Unpaid cart expired"
        );

        let expired = self.formatter.payment_expired();
        let fresh = self.carts.create(&cart.tenant_id, &cart.customer_id).await?;
        Ok(match self.on_browsing(profile, text, fresh).await? {
            OrderReply::Text(reply) => OrderReply::Text(format!("{}\n\n{}", expired, reply)),
            OrderReply::NotOrdering => OrderReply::Text(expired),
            other => other,
        })
    }

    async fn on_browsing(
        &self,
        profile: &BusinessProfile,
        text: &str,
        cart: Cart,
    ) -> Result<OrderReply, AgentError> {
        let products = self.products(&profile.tenant_id).await;
        let parsed = self.items.parse(text, &products);

        if !parsed.is_empty() {
            let mut next = cart.clone();
            next.merge_items(&parsed);
            let updated = self
                .transition(
                    &cart,
                    CartPatch::step(CartStep::CollectingItems).with_items(next.items().to_vec()),
                )
                .await?;
            return Ok(OrderReply::Text(self.formatter.items_added(&updated)));
        }

        let intent = self.intents.classify(text);
        if intent.is_ordering {
            self.transition(&cart, CartPatch::step(CartStep::CollectingItems))
                .await?;
            return Ok(OrderReply::Text(self.formatter.menu_listing(profile, &products)));
        }

        Ok(OrderReply::NotOrdering)
    }

    async fn on_collecting_items(
        &self,
        profile: &BusinessProfile,
        text: &str,
        words: &HashSet<String>,
        cart: Cart,
    ) -> Result<OrderReply, AgentError> {
        if contains_any(words, CHECKOUT_WORDS) {
            if !cart.has_items() {
                return Ok(OrderReply::Text(self.formatter.add_items_first()));
            }
            let updated = self
                .transition(&cart, CartPatch::step(CartStep::CollectingDetails))
                .await?;
            let validation = self.validator.validate(&updated);
            return Ok(OrderReply::Text(
                self.formatter.details_request(&updated, &validation),
            ));
        }

        let products = self.products(&profile.tenant_id).await;
        let parsed = self.items.parse(text, &products);
        if !parsed.is_empty() {
            let mut next = cart.clone();
            next.merge_items(&parsed);
            let updated = self
                .transition(&cart, CartPatch::default().with_items(next.items().to_vec()))
                .await?;
            return Ok(OrderReply::Text(self.formatter.items_added(&updated)));
        }

        if self.intents.classify(text).intent == Intent::Menu {
            return Ok(OrderReply::Text(self.formatter.menu_listing(profile, &products)));
        }
        Ok(OrderReply::Text(self.formatter.item_not_found()))
    }

    async fn on_collecting_details(&self, text: &str, cart: Cart) -> Result<OrderReply, AgentError> {
        let details = self.details.parse(text);
        tracing::debug!(customer = %cart.customer_id, found = details.found_count(), "Parsed customer details");

        let mut patch = CartPatch::from(details);
        let mut merged = cart.clone();
        patch.apply_to(&mut merged);

        let validation = self.validator.validate(&merged);
        if validation.is_complete {
            patch.step = Some(CartStep::ConfirmingOrder);
        }
        if patch.is_empty() {
            return Ok(OrderReply::Text(self.formatter.missing_fields_prompt(&validation)));
        }

        let updated = self.transition(&cart, patch).await?;
        if validation.is_complete {
            Ok(OrderReply::Text(self.formatter.confirmation(&updated)))
        } else {
            Ok(OrderReply::Text(self.formatter.missing_fields_prompt(&validation)))
        }
    }

    /// Create the payment, notify the business and deliver the QR
    async fn checkout(&self, profile: &BusinessProfile, cart: Cart) -> Result<OrderReply, AgentError> {
        let request = PaymentRequest {
            tenant_id: cart.tenant_id.clone(),
            tenant_short: profile.short_id(),
            customer_id: cart.customer_id.clone(),
            items: cart.items().to_vec(),
            total: cart.total_amount(),
            customer_name: cart.customer_name.clone(),
            customer_phone: cart.phone_number.clone(),
            expiry_minutes: u32::try_from(self.payment_expiry.num_minutes()).unwrap_or(u32::MAX),
        };

        let link = match self.integrations.payment.create_payment(&request).await {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(
                    tenant_id = %cart.tenant_id,
                    customer = %cart.customer_id,
                    gateway = self.integrations.payment.name(),
                    error = %e,
                    "Payment creation failed, clearing cart"
                );
                counter!("order_adapter_failures_total", "adapter" => "payment").increment(1);
                if let Err(e) = self.carts.clear(&cart.tenant_id, &cart.customer_id).await {
                    tracing::error!(tenant_id = %cart.tenant_id, customer = %cart.customer_id, error = %e, "Failed to clear cart after payment failure");
                }
                return Ok(OrderReply::Text(self.formatter.payment_failed()));
            }
        };

        // A payment exists from here on, so store failures no longer abort
        let cart = match self
            .transition(
                &cart,
                CartPatch::step(CartStep::AwaitingPayment).with_order_id(&link.order_id),
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(
                    tenant_id = %cart.tenant_id,
                    customer = %cart.customer_id,
                    order_id = %link.order_id,
                    error = %e,
                    "Payment created but cart step not saved"
                );
                cart
            }
        };
        counter!("orders_created_total").increment(1);
        tracing::info!(tenant_id = %cart.tenant_id, customer = %cart.customer_id, order_id = %link.order_id, total = %cart.total_amount(), "Order awaiting payment");

        if let Err(e) = self
            .integrations
            .notifier
            .notify_new_order(&link.order_id, &cart, profile)
            .await
        {
            tracing::warn!(tenant_id = %cart.tenant_id, order_id = %link.order_id, error = %e, "Business notification failed");
            counter!("order_adapter_failures_total", "adapter" => "notifier").increment(1);
        }

        Ok(self.deliver_payment(profile, &cart, &link).await)
    }

    /// QR image message, else text with the payment link, else hand the text
    /// back to the caller
    async fn deliver_payment(
        &self,
        profile: &BusinessProfile,
        cart: &Cart,
        link: &PaymentLink,
    ) -> OrderReply {
        let to = cart.customer_id.as_str();
        let device_token = profile.device_token.as_deref();

        let image_url = link.qr_url.clone().or_else(|| {
            let payload = link.qr_string.as_deref()?;
            self.integrations
                .qr
                .image_url(payload)
                .map_err(|e| tracing::warn!(order_id = %link.order_id, error = %e, "QR rendering failed"))
                .ok()
        });

        if let Some(url) = image_url.as_deref() {
            let text = self.formatter.payment_instructions(&link.order_id, cart);
            match self
                .integrations
                .messaging
                .send_with_image(to, &text, url, device_token)
                .await
            {
                Ok(()) => return OrderReply::Delivered,
                Err(e) => {
                    tracing::warn!(customer = %to, order_id = %link.order_id, error = %e, "QR image delivery failed, sending link");
                    counter!("order_adapter_failures_total", "adapter" => "messaging_image").increment(1);
                }
            }
        }

        let text = self
            .formatter
            .payment_link_message(&link.order_id, cart, image_url.as_deref());
        match self.integrations.messaging.send(to, &text, device_token).await {
            Ok(()) => OrderReply::Delivered,
            Err(e) => {
                tracing::warn!(customer = %to, order_id = %link.order_id, error = %e, "Payment link delivery failed, returning text");
                counter!("order_adapter_failures_total", "adapter" => "messaging_text").increment(1);
                OrderReply::Text(text)
            }
        }
    }

    async fn cancel(&self, cart: &Cart, reason: &'static str) -> Result<OrderReply, AgentError> {
        self.carts.clear(&cart.tenant_id, &cart.customer_id).await?;
        counter!("orders_cancelled_total", "reason" => reason).increment(1);
        tracing::info!(tenant_id = %cart.tenant_id, customer = %cart.customer_id, from = %cart.step, reason, "Cart cancelled");
        Ok(OrderReply::Text(self.formatter.cancelled()))
    }

    /// Persist a patch, refusing step moves outside the documented order
    async fn transition(&self, cart: &Cart, patch: CartPatch) -> Result<Cart, AgentError> {
        if let Some(to) = patch.step {
            if !cart.step.can_transition_to(to) {
                return Err(AgentError::InvalidTransition { from: cart.step, to });
            }
        }

        let updated = self.carts.update(cart, &patch).await?;
        if updated.step != cart.step {
            counter!(
                "order_step_transitions_total",
                "from" => cart.step.as_str(),
                "to" => updated.step.as_str()
            )
            .increment(1);
            tracing::info!(
                tenant_id = %cart.tenant_id,
                customer = %cart.customer_id,
                from = %cart.step,
                to = %updated.step,
                "Cart step changed"
            );
        }
        Ok(updated)
    }

    /// Active products; an unreachable catalog reads as empty so the
    /// fallback menu is shown
    async fn products(&self, tenant_id: &str) -> Vec<Product> {
        match self.catalog.list_active_products(tenant_id).await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Catalog unavailable");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matching_is_whole_word() {
        let words = message_words("Saya mau pulang, BATAL ya");
        assert!(contains_any(&words, CANCEL_WORDS));
        assert!(contains_any(&words, AFFIRM_WORDS));

        let words = message_words("saya pulang dulu");
        assert!(!contains_any(&words, CANCEL_WORDS));
    }

    #[test]
    fn test_refusal_is_not_affirmation() {
        for text in ["gak jadi ya", "belum ya, nanti dulu", "tidak ya", "Nggak, ok makasih"] {
            assert!(!is_affirmation(&message_words(text)), "{text}");
        }
        for text in ["ya", "Iya benar", "oke lanjut bayar"] {
            assert!(is_affirmation(&message_words(text)), "{text}");
        }
    }

    #[test]
    fn test_checkout_words() {
        assert!(contains_any(&message_words("sudah, lanjut"), CHECKOUT_WORDS));
        assert!(contains_any(&message_words("Checkout!"), CHECKOUT_WORDS));
        assert!(!contains_any(&message_words("tambah ocha"), CHECKOUT_WORDS));
    }

    #[test]
    fn test_reply_text() {
        assert_eq!(OrderReply::Text("halo".to_string()).text(), Some("halo"));
        assert_eq!(OrderReply::Delivered.text(), None);
    }
}
