//! Order completeness validation
//!
//! Decides which required fields a cart still lacks and which part of the
//! conversation comes next. Pure: used both to drive transitions and to
//! build the "what's still needed" prompt.

use serde::Serialize;
use wa_agent_core::Cart;

/// Fields required before an order can be confirmed, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Items,
    CustomerName,
    PhoneNumber,
    OutletPreference,
    DeliveryMethod,
}

impl RequiredField {
    pub const ALL: [RequiredField; 5] = [
        Self::Items,
        Self::CustomerName,
        Self::PhoneNumber,
        Self::OutletPreference,
        Self::DeliveryMethod,
    ];

    /// Customer-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Items => "Menu pesanan",
            Self::CustomerName => "Nama",
            Self::PhoneNumber => "Nomor HP",
            Self::OutletPreference => "Outlet",
            Self::DeliveryMethod => "Ambil sendiri / diantar",
        }
    }

    /// Example of how the customer can supply the field
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Items => "contoh: pesan Salmon Roll 2",
            Self::CustomerName => "contoh: nama saya Ria",
            Self::PhoneNumber => "contoh: HP 081234567890",
            Self::OutletPreference => "contoh: outlet Palagan",
            Self::DeliveryMethod => "contoh: ambil sendiri / diantar",
        }
    }

    fn is_present(&self, cart: &Cart) -> bool {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match self {
            Self::Items => cart.has_items(),
            Self::CustomerName => filled(&cart.customer_name),
            Self::PhoneNumber => filled(&cart.phone_number),
            Self::OutletPreference => filled(&cart.outlet_preference),
            Self::DeliveryMethod => cart.delivery_method.is_some(),
        }
    }
}

/// What the conversation should collect next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    CollectMenuItems,
    CollectCustomerDetails,
    ConfirmOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_complete: bool,
    pub missing_fields: Vec<RequiredField>,
    pub next_step: NextStep,
}

impl ValidationResult {
    /// Missing fields other than the items
    pub fn missing_details(&self) -> impl Iterator<Item = &RequiredField> {
        self.missing_fields
            .iter()
            .filter(|f| **f != RequiredField::Items)
    }
}

/// Order completeness validator
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator;

impl OrderValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, cart: &Cart) -> ValidationResult {
        let missing_fields: Vec<RequiredField> = RequiredField::ALL
            .into_iter()
            .filter(|f| !f.is_present(cart))
            .collect();

        let is_complete = missing_fields.is_empty();
        let next_step = if is_complete {
            NextStep::ConfirmOrder
        } else if cart.has_items() {
            NextStep::CollectCustomerDetails
        } else {
            NextStep::CollectMenuItems
        };

        ValidationResult {
            is_complete,
            missing_fields,
            next_step,
        }
    }
}
