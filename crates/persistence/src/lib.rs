//! Persistence layer for the WhatsApp ordering agent
//!
//! Provides storage for:
//! - Carts (one open cart per tenant and customer, versioned writes)
//! - Product catalogs
//! - Business profiles keyed by WhatsApp number
//!
//! Each store has a ScyllaDB implementation and an in-memory one used in
//! development and tests.

pub mod businesses;
pub mod carts;
pub mod catalog;
pub mod client;
pub mod error;
pub mod schema;

pub use businesses::{BusinessDirectory, InMemoryBusinessDirectory, ScyllaBusinessDirectory};
pub use carts::{CartStore, InMemoryCartStore, ScyllaCartStore};
pub use catalog::{InMemoryProductCatalog, ProductCatalog, ScyllaProductCatalog};
pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;

use std::sync::Arc;

/// Initialize the persistence layer with ScyllaDB
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        carts: Arc::new(ScyllaCartStore::new(client.clone())),
        catalog: Arc::new(ScyllaProductCatalog::new(client.clone())),
        businesses: Arc::new(ScyllaBusinessDirectory::new(client.clone())),
        scylla: Some(client),
    })
}

/// Combined persistence layer with all stores
#[derive(Clone)]
pub struct PersistenceLayer {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub businesses: Arc<dyn BusinessDirectory>,
    /// Present when backed by ScyllaDB
    scylla: Option<ScyllaClient>,
}

impl PersistenceLayer {
    /// In-memory stores; nothing survives a restart
    pub fn in_memory() -> Self {
        Self {
            carts: Arc::new(InMemoryCartStore::new()),
            catalog: Arc::new(InMemoryProductCatalog::new()),
            businesses: Arc::new(InMemoryBusinessDirectory::new()),
            scylla: None,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.scylla.is_some()
    }

    /// Store mode name for health reporting
    pub fn mode(&self) -> &'static str {
        if self.is_durable() {
            "scylla"
        } else {
            "memory"
        }
    }

    /// Check the backing store is reachable
    pub async fn ping(&self) -> Result<(), PersistenceError> {
        match &self.scylla {
            Some(client) => client.ping().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_layer() {
        let layer = PersistenceLayer::in_memory();
        assert!(!layer.is_durable());
        assert_eq!(layer.mode(), "memory");
        assert!(layer.ping().await.is_ok());

        let cart = layer.carts.create("t1", "c1").await.unwrap();
        let found = layer.carts.find_open("t1", "c1").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(cart.id));
    }
}
