//! Cart: the persisted, in-progress order for one customer of one tenant
//!
//! The cart total is never stored as an independent field. It is derived from
//! the items on every read, so every mutation of `items` is reflected in
//! `total_amount()` without a separate recomputation step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ParsedOrderItem;

/// Ordering step of a cart
///
/// Steps advance in declaration order. `Completed` is terminal and reachable
/// from every step (cancellation, payment hand-off, terminal fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartStep {
    #[default]
    Browsing,
    CollectingItems,
    CollectingDetails,
    ConfirmingOrder,
    AwaitingPayment,
    Completed,
    /// A stored step value this build does not recognise
    #[serde(other)]
    Unknown,
}

impl CartStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::CollectingItems => "collecting_items",
            Self::CollectingDetails => "collecting_details",
            Self::ConfirmingOrder => "confirming_order",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored step; unrecognised values map to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "browsing" => Self::Browsing,
            "collecting_items" => Self::CollectingItems,
            "collecting_details" => Self::CollectingDetails,
            "confirming_order" => Self::ConfirmingOrder,
            "awaiting_payment" => Self::AwaitingPayment,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    /// Position in the documented step order
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            Self::Browsing => Some(0),
            Self::CollectingItems => Some(1),
            Self::CollectingDetails => Some(2),
            Self::ConfirmingOrder => Some(3),
            Self::AwaitingPayment => Some(4),
            Self::Completed => Some(5),
            Self::Unknown => None,
        }
    }

    /// Whether a cart in this step is still the customer's active cart
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// All steps reachable from this one, excluding staying put
    pub fn valid_transitions(&self) -> Vec<CartStep> {
        match self {
            Self::Browsing => vec![Self::CollectingItems, Self::Completed],
            Self::CollectingItems => vec![Self::CollectingDetails, Self::Completed],
            Self::CollectingDetails => vec![Self::ConfirmingOrder, Self::Completed],
            Self::ConfirmingOrder => vec![Self::AwaitingPayment, Self::Completed],
            Self::AwaitingPayment => vec![Self::Completed],
            Self::Completed => vec![],
            // A corrupt step can only be reset
            Self::Unknown => vec![Self::Browsing, Self::Completed],
        }
    }

    pub fn can_transition_to(&self, to: CartStep) -> bool {
        *self == to || self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for CartStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer receives the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pickup" => Some(Self::Pickup),
            "delivery" => Some(Self::Delivery),
            _ => None,
        }
    }

    /// Customer-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pickup => "Ambil sendiri",
            Self::Delivery => "Diantar",
        }
    }
}

/// One product line in a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&ParsedOrderItem> for CartItem {
    fn from(item: &ParsedOrderItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.price.max(Decimal::ZERO),
        }
    }
}

/// In-progress order for a (tenant, customer) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub tenant_id: String,
    pub customer_id: String,
    pub step: CartStep,
    items: Vec<CartItem>,
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub outlet_preference: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    /// Gateway order id, set when the payment is created
    #[serde(default)]
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: i64,
}

impl Cart {
    /// Create an empty browsing cart
    pub fn new(tenant_id: &str, customer_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            customer_id: customer_id.to_string(),
            step: CartStep::Browsing,
            items: Vec::new(),
            customer_name: None,
            phone_number: None,
            outlet_preference: None,
            delivery_method: None,
            order_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Replace all items; zero-quantity lines are dropped
    pub fn set_items(&mut self, items: Vec<CartItem>) {
        self.items = items.into_iter().filter(|i| i.quantity > 0).collect();
    }

    /// Merge parsed items, keeping first-added order.
    ///
    /// A product already in the cart has its quantity increased; new products
    /// are appended.
    pub fn merge_items(&mut self, parsed: &[ParsedOrderItem]) {
        for item in parsed.iter().filter(|i| i.quantity > 0) {
            match self
                .items
                .iter_mut()
                .find(|existing| existing.product_id == item.product_id)
            {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => self.items.push(CartItem::from(item)),
            }
        }
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Sum of quantity x unit price over all items
    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Empty the cart and close it
    pub fn reset_to_completed(&mut self) {
        self.items.clear();
        self.step = CartStep::Completed;
    }
}

/// Partial update applied by the cart store in one read-modify-write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartPatch {
    pub step: Option<CartStep>,
    pub items: Option<Vec<CartItem>>,
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub outlet_preference: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub order_id: Option<String>,
}

impl CartPatch {
    pub fn step(step: CartStep) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    pub fn with_items(mut self, items: Vec<CartItem>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn with_step(mut self, step: CartStep) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_order_id(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch. Detail fields only overwrite when present, so a known
    /// value is never replaced by an absent one.
    pub fn apply_to(&self, cart: &mut Cart) {
        if let Some(step) = self.step {
            cart.step = step;
        }
        if let Some(items) = &self.items {
            cart.set_items(items.clone());
        }
        if let Some(name) = &self.customer_name {
            cart.customer_name = Some(name.clone());
        }
        if let Some(phone) = &self.phone_number {
            cart.phone_number = Some(phone.clone());
        }
        if let Some(outlet) = &self.outlet_preference {
            cart.outlet_preference = Some(outlet.clone());
        }
        if let Some(method) = self.delivery_method {
            cart.delivery_method = Some(method);
        }
        if let Some(order_id) = &self.order_id {
            cart.order_id = Some(order_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(id: &str, qty: u32, price: i64) -> ParsedOrderItem {
        ParsedOrderItem {
            product_id: id.to_string(),
            product_name: id.to_uppercase(),
            quantity: qty,
            price: Decimal::from(price),
        }
    }

    #[test]
    fn test_total_follows_items() {
        let mut cart = Cart::new("t1", "62811");
        assert_eq!(cart.total_amount(), Decimal::ZERO);

        cart.merge_items(&[parsed("a", 2, 50_000), parsed("b", 1, 12_500)]);
        assert_eq!(cart.total_amount(), Decimal::from(112_500));

        cart.merge_items(&[parsed("a", 1, 50_000)]);
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.total_amount(), Decimal::from(162_500));

        cart.clear_items();
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_merge_keeps_insertion_order() {
        let mut cart = Cart::new("t1", "62811");
        cart.merge_items(&[parsed("b", 1, 10)]);
        cart.merge_items(&[parsed("a", 1, 10), parsed("b", 2, 10)]);

        let ids: Vec<&str> = cart.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn test_negative_price_is_clamped() {
        let mut cart = Cart::new("t1", "62811");
        cart.merge_items(&[parsed("a", 2, -5)]);
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_step_transitions() {
        assert!(CartStep::Browsing.can_transition_to(CartStep::CollectingItems));
        assert!(CartStep::AwaitingPayment.can_transition_to(CartStep::Completed));
        assert!(CartStep::CollectingDetails.can_transition_to(CartStep::CollectingDetails));
        assert!(!CartStep::ConfirmingOrder.can_transition_to(CartStep::CollectingItems));
        assert!(!CartStep::Completed.can_transition_to(CartStep::Browsing));
        assert!(CartStep::Unknown.can_transition_to(CartStep::Browsing));
    }

    #[test]
    fn test_step_parse_roundtrip_and_unknown() {
        for step in [
            CartStep::Browsing,
            CartStep::CollectingItems,
            CartStep::CollectingDetails,
            CartStep::ConfirmingOrder,
            CartStep::AwaitingPayment,
            CartStep::Completed,
        ] {
            assert_eq!(CartStep::parse(step.as_str()), step);
        }
        assert_eq!(CartStep::parse("shipping"), CartStep::Unknown);

        let step: CartStep = serde_json::from_str("\"teleporting\"").unwrap();
        assert_eq!(step, CartStep::Unknown);
    }

    #[test]
    fn test_patch_never_erases_known_fields() {
        let mut cart = Cart::new("t1", "62811");
        cart.customer_name = Some("Ria".to_string());

        let patch = CartPatch {
            phone_number: Some("081234567890".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut cart);

        assert_eq!(cart.customer_name.as_deref(), Some("Ria"));
        assert_eq!(cart.phone_number.as_deref(), Some("081234567890"));
    }

    #[test]
    fn test_patch_sets_order_id() {
        let mut cart = Cart::new("t1", "62811");
        assert!(cart.order_id.is_none());

        CartPatch::step(CartStep::AwaitingPayment)
            .with_order_id("ORDER-t1-1")
            .apply_to(&mut cart);
        assert_eq!(cart.order_id.as_deref(), Some("ORDER-t1-1"));

        CartPatch::step(CartStep::Completed).apply_to(&mut cart);
        assert_eq!(cart.order_id.as_deref(), Some("ORDER-t1-1"));
    }

    #[test]
    fn test_reset_to_completed() {
        let mut cart = Cart::new("t1", "62811");
        cart.merge_items(&[parsed("a", 1, 10)]);
        cart.step = CartStep::AwaitingPayment;
        cart.reset_to_completed();
        assert_eq!(cart.step, CartStep::Completed);
        assert!(!cart.has_items());
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }
}
