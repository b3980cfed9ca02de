//! Product catalog access

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use parking_lot::RwLock;
use wa_agent_core::Product;

/// Read access to a tenant's products
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Active products of the tenant in catalog order
    async fn list_active_products(&self, tenant_id: &str) -> Result<Vec<Product>, PersistenceError>;

    /// Insert or replace a product
    async fn upsert(&self, product: &Product) -> Result<(), PersistenceError>;
}

/// ScyllaDB implementation of the product catalog
#[derive(Clone)]
pub struct ScyllaProductCatalog {
    client: ScyllaClient,
}

impl ScyllaProductCatalog {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProductCatalog for ScyllaProductCatalog {
    async fn list_active_products(&self, tenant_id: &str) -> Result<Vec<Product>, PersistenceError> {
        let query = format!(
            "SELECT product_id, name, price, description, category, is_active
             FROM {}.products WHERE tenant_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (tenant_id,))
            .await?;

        let mut products = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let (id, name, price, description, category, is_active): (
                    String,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<bool>,
                ) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

                // Nameless products cannot be matched, so they are not listed
                let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
                    tracing::warn!(tenant_id = %tenant_id, product_id = %id, "Skipping product without name");
                    continue;
                };

                if !is_active.unwrap_or(true) {
                    continue;
                }

                products.push(Product {
                    id,
                    tenant_id: tenant_id.to_string(),
                    name,
                    price: price.unwrap_or_else(|| "0".to_string()),
                    description,
                    category,
                    is_active: true,
                });
            }
        }

        tracing::debug!(tenant_id = %tenant_id, count = products.len(), "Loaded active products");
        Ok(products)
    }

    async fn upsert(&self, product: &Product) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.products (
                tenant_id, product_id, name, price, description, category, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &product.tenant_id,
                    &product.id,
                    &product.name,
                    &product.price,
                    &product.description,
                    &product.category,
                    product.is_active,
                ),
            )
            .await?;

        Ok(())
    }
}

/// In-memory catalog; insertion order is catalog order
#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn list_active_products(&self, tenant_id: &str) -> Result<Vec<Product>, PersistenceError> {
        Ok(self
            .products
            .read()
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn upsert(&self, product: &Product) -> Result<(), PersistenceError> {
        let mut products = self.products.write();
        match products
            .iter_mut()
            .find(|p| p.tenant_id == product.tenant_id && p.id == product.id)
        {
            Some(existing) => *existing = product.clone(),
            None => products.push(product.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lists_active_for_tenant() {
        let mut hidden = Product::new("p3", "t1", "Secret Menu", "99000");
        hidden.is_active = false;

        let catalog = InMemoryProductCatalog::with_products(vec![
            Product::new("p1", "t1", "Salmon Roll", "50000"),
            Product::new("p2", "t2", "Es Teh", "5000"),
            hidden,
        ]);

        let products = catalog.list_active_products("t1").await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Salmon Roll");
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let catalog = InMemoryProductCatalog::new();
        catalog
            .upsert(&Product::new("p1", "t1", "Salmon Roll", "50000"))
            .await
            .unwrap();
        catalog
            .upsert(&Product::new("p2", "t1", "Tuna Roll", "45000"))
            .await
            .unwrap();
        catalog
            .upsert(&Product::new("p1", "t1", "Salmon Roll", "55000"))
            .await
            .unwrap();

        let products = catalog.list_active_products("t1").await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, "55000");
        assert_eq!(products[1].id, "p2");
    }
}
