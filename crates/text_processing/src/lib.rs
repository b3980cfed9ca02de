//! Free-text parsing for Indonesian WhatsApp orders
//!
//! This crate provides pure, deterministic parsers:
//! - **Intent Classification**: keyword scoring that gates the order flow
//! - **Order Item Parsing**: `{product, quantity}` extraction against a catalog
//! - **Customer Detail Parsing**: name, phone, outlet and delivery method
//!
//! Each parser is a pure function of its inputs so it can be swapped for an
//! NLU model without touching the order state machine.
//!
//! # Example
//!
//! ```
//! use wa_agent_text_processing::{IntentClassifier, Intent};
//!
//! let classifier = IntentClassifier::new();
//! let result = classifier.classify("mau pesan menu dong");
//!
//! assert_eq!(result.intent, Intent::Menu);
//! assert!(result.is_ordering);
//! ```

pub mod intent;
pub mod order_items;
pub mod slot_extraction;

mod normalize;

pub use intent::{ClassifiedIntent, Intent, IntentClassifier};
pub use order_items::OrderItemParser;
pub use slot_extraction::{CustomerDetailParser, CustomerDetails};
