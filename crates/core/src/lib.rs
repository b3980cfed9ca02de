//! Core domain types for the WhatsApp ordering agent
//!
//! This crate provides the types shared by every other crate:
//! - Cart and cart steps (the persisted order-in-progress)
//! - Catalog products and parsed order items
//! - Tenant business profiles
//! - Inbound WhatsApp messages
//! - Rupiah formatting

pub mod business;
pub mod cart;
pub mod catalog;
pub mod message;
pub mod money;

pub use business::BusinessProfile;
pub use cart::{Cart, CartItem, CartPatch, CartStep, DeliveryMethod};
pub use catalog::{ParsedOrderItem, Product};
pub use message::{normalize_phone, InboundMessage};
pub use money::format_rupiah;

pub use rust_decimal::Decimal;
