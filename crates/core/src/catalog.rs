//! Catalog products and order items extracted from free text

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A tenant's product, read-only from the ordering flow's perspective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Price as stored by the dashboard, e.g. "50000" or "12500.00"
    pub price: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    pub fn new(id: &str, tenant_id: &str, name: &str, price: &str) -> Self {
        Self {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            price: price.to_string(),
            description: None,
            category: None,
            is_active: true,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Parsed unit price; malformed or negative prices are treated as zero
    pub fn unit_price(&self) -> Decimal {
        let raw = self.price.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .ok()
            .filter(|p| !p.is_sign_negative())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Ephemeral extraction result, merged into a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl ParsedOrderItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            price: product.unit_price(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_price_parsing() {
        assert_eq!(Product::new("1", "t", "A", "50000").unit_price(), Decimal::from(50_000));
        assert_eq!(
            Product::new("1", "t", "A", " 12500.50 ").unit_price(),
            Decimal::from_str("12500.50").unwrap()
        );
        assert_eq!(Product::new("1", "t", "A", "gratis").unit_price(), Decimal::ZERO);
        assert_eq!(Product::new("1", "t", "A", "").unit_price(), Decimal::ZERO);
        assert_eq!(Product::new("1", "t", "A", "-100").unit_price(), Decimal::ZERO);
    }

    #[test]
    fn test_product_deserialize_defaults() {
        let json = r#"{"id":"p1","tenant_id":"t1","name":"Salmon Roll","price":"50000"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.is_active);
        assert!(product.category.is_none());
    }
}
