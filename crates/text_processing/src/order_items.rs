//! Order item extraction
//!
//! Finds catalog products mentioned in a free-text message together with an
//! optional quantity. Matching is per product, so a product appears at most
//! once per parse no matter how often it is mentioned.

use once_cell::sync::Lazy;
use regex::Regex;
use wa_agent_core::{ParsedOrderItem, Product};

use crate::normalize::normalize;

/// Leading ordering phrases; capture group 1 is the item-bearing remainder
static ORDER_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(?:saya |aku |sy )?(?:mau|ingin|pengen|pingin|mo) (?:pesan|pesen|order|beli) (.+)$").unwrap(),
        Regex::new(r"^(?:pesan|pesen|order|beli|tambah) (.+)$").unwrap(),
        Regex::new(r"^(?:saya |aku )?(?:mau|ingin|pengen|minta) (.+)$").unwrap(),
    ]
});

/// Quantity shapes tried in order, `{name}` is replaced by an escaped variant.
/// The quantity is captured as `qty`; a loose shape also captures the `gap`
/// between name and number.
const QUANTITY_SHAPES: &[&str] = &[
    r"{name}\s+(?P<qty>\d+)\b",
    r"{name}\s*[x×]\s*(?P<qty>\d+)\b",
    r"\b(?P<qty>\d+)\s*(?:x|×|pcs|porsi|buah|biji)?\s*{name}",
    r"{name}(?P<gap>[^\d,+&]{0,15}?)(?P<qty>\d+)\b",
];

/// Words that start the next item; a loose quantity never reaches past one
const ITEM_SEPARATORS: &[&str] = &["dan", "sama", "sm", "serta", "plus", "terus", "trus"];

/// Extracts `{product, quantity}` pairs from free text
#[derive(Debug, Clone)]
pub struct OrderItemParser {
    max_quantity: u32,
}

impl Default for OrderItemParser {
    fn default() -> Self {
        Self::new(50)
    }
}

impl OrderItemParser {
    /// `max_quantity` bounds an explicit quantity; anything outside
    /// `1..=max_quantity` falls back to the default of 1.
    pub fn new(max_quantity: u32) -> Self {
        Self {
            max_quantity: max_quantity.max(1),
        }
    }

    /// Parse the message against the catalog.
    ///
    /// Results follow catalog order, not message order. Inactive products are
    /// never matched.
    pub fn parse(&self, message: &str, products: &[Product]) -> Vec<ParsedOrderItem> {
        let full = normalize(message);
        if full.is_empty() {
            return Vec::new();
        }
        let isolated = Self::isolate_items(&full);

        let active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();

        active
            .iter()
            .filter_map(|product| {
                let variants = Self::name_variants(product, &active);
                let matched: Vec<&String> = variants
                    .iter()
                    .filter(|v| isolated.contains(v.as_str()) || full.contains(v.as_str()))
                    .collect();
                if matched.is_empty() {
                    return None;
                }

                let quantity = matched
                    .iter()
                    .find_map(|v| {
                        self.find_quantity(&isolated, v)
                            .or_else(|| self.find_quantity(&full, v))
                    })
                    .unwrap_or(1);

                tracing::trace!(product = %product.name, quantity, "Matched order item");
                Some(ParsedOrderItem::from_product(product, quantity))
            })
            .collect()
    }

    /// Strip a leading ordering phrase, or return the whole message
    fn isolate_items(text: &str) -> String {
        ORDER_PHRASES
            .iter()
            .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| text.to_string())
    }

    /// Lowercase name, spaces removed, spaces as underscores, and the first
    /// word when no other active product shares it
    fn name_variants(product: &Product, catalog: &[&Product]) -> Vec<String> {
        let lower = normalize(&product.name);
        if lower.is_empty() {
            return Vec::new();
        }

        let mut variants = vec![lower.clone()];
        let compact = lower.replace(' ', "");
        let underscored = lower.replace(' ', "_");
        for v in [compact, underscored] {
            if !variants.contains(&v) {
                variants.push(v);
            }
        }

        if let Some(first) = lower.split(' ').next() {
            let shared = catalog.iter().any(|other| {
                other.id != product.id
                    && normalize(&other.name).split(' ').next() == Some(first)
            });
            if first.chars().count() >= 3 && first != lower && !shared {
                variants.push(first.to_string());
            }
        }

        variants
    }

    fn find_quantity(&self, text: &str, variant: &str) -> Option<u32> {
        let escaped = regex::escape(variant);
        QUANTITY_SHAPES.iter().find_map(|shape| {
            let re = match Regex::new(&shape.replace("{name}", &escaped)) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(error = %e, variant, "Skipping quantity pattern");
                    return None;
                }
            };
            let found = re
                .captures_iter(text)
                .filter(|c| !c.name("gap").is_some_and(|gap| crosses_item(gap.as_str())))
                .filter_map(|c| c.name("qty"))
                .filter_map(|m| m.as_str().parse::<u32>().ok())
                .find(|q| (1..=self.max_quantity).contains(q));
            found
        })
    }
}

fn crosses_item(gap: &str) -> bool {
    gap.split_whitespace().any(|w| ITEM_SEPARATORS.contains(&w))
}
