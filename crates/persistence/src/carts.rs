//! Cart persistence
//!
//! Every write is a compare-and-swap on the cart's `version`: a writer that
//! read a stale cart gets `PersistenceError::Conflict` instead of silently
//! overwriting a concurrent change.
//!
//! Completed carts are kept as history. The customer's open cart is found
//! through a one-row pointer per (tenant, customer), so lookups never read
//! that history.

use crate::client::lwt_applied;
use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;
use wa_agent_core::{Cart, CartItem, CartPatch, CartStep, DeliveryMethod};

/// Cart store trait
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The customer's open (non-completed) cart
    async fn find_open(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> Result<Option<Cart>, PersistenceError>;

    /// Create an empty browsing cart. Fails with `Conflict` while the
    /// customer still has an open cart.
    async fn create(&self, tenant_id: &str, customer_id: &str) -> Result<Cart, PersistenceError>;

    /// Apply a patch to `cart`, failing with `Conflict` if the stored version
    /// no longer matches `cart.version`
    async fn update(&self, cart: &Cart, patch: &CartPatch) -> Result<Cart, PersistenceError>;

    /// Empty and complete the customer's open cart, if any
    async fn clear(&self, tenant_id: &str, customer_id: &str) -> Result<(), PersistenceError>;
}

/// Next state of `cart` after `patch`, with version and timestamp bumped
fn next_revision(cart: &Cart, patch: &CartPatch) -> Cart {
    let mut next = cart.clone();
    patch.apply_to(&mut next);
    next.version = cart.version + 1;
    next.updated_at = Utc::now();
    next
}

fn clear_patch() -> CartPatch {
    CartPatch::step(CartStep::Completed).with_items(Vec::new())
}

/// ScyllaDB implementation of the cart store
#[derive(Clone)]
pub struct ScyllaCartStore {
    client: ScyllaClient,
}

type CartRow = (
    Uuid,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

impl ScyllaCartStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn open_pointer(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> Result<Option<Uuid>, PersistenceError> {
        let query = format!(
            "SELECT cart_id FROM {}.open_carts WHERE tenant_id = ? AND customer_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (tenant_id, customer_id))
            .await?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let (cart_id,): (Uuid,) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(Some(cart_id))
            }
            None => Ok(None),
        }
    }

    /// Drop the pointer if it still names `cart_id`. Failures only leave a
    /// stale pointer behind, which `find_open` discards on the next read.
    async fn release_pointer(&self, tenant_id: &str, customer_id: &str, cart_id: Uuid) {
        let query = format!(
            "DELETE FROM {}.open_carts WHERE tenant_id = ? AND customer_id = ? IF cart_id = ?",
            self.client.keyspace()
        );

        if let Err(e) = self
            .client
            .session()
            .query_unpaged(query, (tenant_id, customer_id, cart_id))
            .await
        {
            tracing::warn!(
                cart_id = %cart_id,
                tenant_id = %tenant_id,
                error = %e,
                "Failed to release open cart pointer"
            );
        }
    }

    async fn load(
        &self,
        tenant_id: &str,
        customer_id: &str,
        cart_id: Uuid,
    ) -> Result<Option<Cart>, PersistenceError> {
        let query = format!(
            "SELECT cart_id, step, items_json, customer_name, phone_number,
                    outlet_preference, delivery_method, order_id, created_at, updated_at, version
             FROM {}.carts WHERE tenant_id = ? AND customer_id = ? AND cart_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (tenant_id, customer_id, cart_id))
            .await?;

        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let typed: CartRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                Ok(Some(Self::row_to_cart(tenant_id, customer_id, typed)))
            }
            None => Ok(None),
        }
    }

    /// Malformed stored values never fail the read. A cart with unreadable
    /// items comes back empty with an `Unknown` step so the order flow resets it.
    fn row_to_cart(tenant_id: &str, customer_id: &str, row: CartRow) -> Cart {
        let (
            cart_id,
            step,
            items_json,
            customer_name,
            phone_number,
            outlet_preference,
            delivery_method,
            order_id,
            created_at,
            updated_at,
            version,
        ) = row;

        let mut cart = Cart::new(tenant_id, customer_id);
        cart.id = cart_id;
        cart.step = step.as_deref().map(CartStep::parse).unwrap_or(CartStep::Unknown);

        match serde_json::from_str::<Vec<CartItem>>(items_json.as_deref().unwrap_or("[]")) {
            Ok(items) => cart.set_items(items),
            Err(e) => {
                tracing::warn!(
                    cart_id = %cart_id,
                    tenant_id = %tenant_id,
                    error = %e,
                    "Unreadable cart items, marking cart for reset"
                );
                cart.step = CartStep::Unknown;
            }
        }

        cart.customer_name = customer_name;
        cart.phone_number = phone_number;
        cart.outlet_preference = outlet_preference;
        cart.delivery_method = delivery_method.as_deref().and_then(DeliveryMethod::parse);
        cart.order_id = order_id;
        cart.created_at = created_at
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        cart.updated_at = updated_at
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(cart.created_at);
        cart.version = version.unwrap_or(0);
        cart
    }
}

#[async_trait]
impl CartStore for ScyllaCartStore {
    async fn find_open(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> Result<Option<Cart>, PersistenceError> {
        let Some(cart_id) = self.open_pointer(tenant_id, customer_id).await? else {
            return Ok(None);
        };

        match self.load(tenant_id, customer_id, cart_id).await? {
            Some(cart) if cart.step.is_open() => Ok(Some(cart)),
            _ => {
                tracing::debug!(cart_id = %cart_id, tenant_id = %tenant_id, "Discarding stale open cart pointer");
                self.release_pointer(tenant_id, customer_id, cart_id).await;
                Ok(None)
            }
        }
    }

    async fn create(&self, tenant_id: &str, customer_id: &str) -> Result<Cart, PersistenceError> {
        let cart = Cart::new(tenant_id, customer_id);

        // Claim the pointer first so two creators cannot both open a cart
        let claim = format!(
            "INSERT INTO {}.open_carts (tenant_id, customer_id, cart_id) VALUES (?, ?, ?) IF NOT EXISTS",
            self.client.keyspace()
        );
        let result = self
            .client
            .session()
            .query_unpaged(claim, (&cart.tenant_id, &cart.customer_id, cart.id))
            .await?;

        if !lwt_applied(result.rows)? {
            return Err(PersistenceError::Conflict(format!(
                "{}/{} already has an open cart",
                tenant_id, customer_id
            )));
        }

        let query = format!(
            "INSERT INTO {}.carts (
                tenant_id, customer_id, cart_id, step, items_json, total_amount,
                created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &cart.tenant_id,
                    &cart.customer_id,
                    cart.id,
                    cart.step.as_str(),
                    "[]",
                    cart.total_amount().to_string(),
                    cart.created_at.timestamp_millis(),
                    cart.updated_at.timestamp_millis(),
                    cart.version,
                ),
            )
            .await?;

        tracing::info!(
            cart_id = %cart.id,
            tenant_id = %tenant_id,
            customer = %customer_id,
            "Cart created in ScyllaDB"
        );

        Ok(cart)
    }

    async fn update(&self, cart: &Cart, patch: &CartPatch) -> Result<Cart, PersistenceError> {
        let next = next_revision(cart, patch);
        let items_json = serde_json::to_string(next.items())?;

        let query = format!(
            "UPDATE {}.carts SET step = ?, items_json = ?, total_amount = ?,
                    customer_name = ?, phone_number = ?, outlet_preference = ?,
                    delivery_method = ?, order_id = ?, updated_at = ?, version = ?
             WHERE tenant_id = ? AND customer_id = ? AND cart_id = ?
             IF version = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    next.step.as_str(),
                    items_json,
                    next.total_amount().to_string(),
                    &next.customer_name,
                    &next.phone_number,
                    &next.outlet_preference,
                    next.delivery_method.map(|m| m.as_str()),
                    &next.order_id,
                    next.updated_at.timestamp_millis(),
                    next.version,
                    &next.tenant_id,
                    &next.customer_id,
                    next.id,
                    cart.version,
                ),
            )
            .await?;

        if !lwt_applied(result.rows)? {
            tracing::warn!(
                cart_id = %cart.id,
                expected_version = cart.version,
                "Cart update lost a concurrent write"
            );
            return Err(PersistenceError::Conflict(format!(
                "cart {} changed since version {}",
                cart.id, cart.version
            )));
        }

        if !next.step.is_open() {
            self.release_pointer(&next.tenant_id, &next.customer_id, next.id)
                .await;
        }

        tracing::debug!(cart_id = %next.id, step = %next.step, version = next.version, "Cart updated");
        Ok(next)
    }

    async fn clear(&self, tenant_id: &str, customer_id: &str) -> Result<(), PersistenceError> {
        // A conflicting writer gets one re-read before giving up
        for _ in 0..2 {
            let Some(cart) = self.find_open(tenant_id, customer_id).await? else {
                return Ok(());
            };

            match self.update(&cart, &clear_patch()).await {
                Ok(_) => {
                    tracing::info!(tenant_id = %tenant_id, customer = %customer_id, cart_id = %cart.id, "Cart cleared");
                    return Ok(());
                }
                Err(PersistenceError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(PersistenceError::Conflict(format!(
            "could not clear cart for {}/{}",
            tenant_id, customer_id
        )))
    }
}

#[derive(Default)]
struct CartTables {
    carts: HashMap<Uuid, Cart>,
    /// (tenant, customer) to the open cart
    open: HashMap<(String, String), Uuid>,
}

impl CartTables {
    fn open_cart(&self, tenant_id: &str, customer_id: &str) -> Option<&Cart> {
        self.open
            .get(&(tenant_id.to_string(), customer_id.to_string()))
            .and_then(|id| self.carts.get(id))
            .filter(|cart| cart.step.is_open())
    }

    /// Store `cart` and keep the open pointer in step with it
    fn store(&mut self, cart: Cart) {
        let key = (cart.tenant_id.clone(), cart.customer_id.clone());
        if cart.step.is_open() {
            self.open.insert(key, cart.id);
        } else if self.open.get(&key) == Some(&cart.id) {
            self.open.remove(&key);
        }
        self.carts.insert(cart.id, cart);
    }
}

/// In-memory cart store for development and tests
#[derive(Default)]
pub struct InMemoryCartStore {
    tables: RwLock<CartTables>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cart of the customer, open or not, oldest first
    pub fn history(&self, tenant_id: &str, customer_id: &str) -> Vec<Cart> {
        let mut carts: Vec<Cart> = self
            .tables
            .read()
            .carts
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.customer_id == customer_id)
            .cloned()
            .collect();
        carts.sort_by_key(|c| c.created_at);
        carts
    }

    /// Store a cart as-is, replacing any cart with the same id. An open cart
    /// becomes the customer's open cart.
    pub fn put(&self, cart: Cart) {
        self.tables.write().store(cart);
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn find_open(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> Result<Option<Cart>, PersistenceError> {
        Ok(self.tables.read().open_cart(tenant_id, customer_id).cloned())
    }

    async fn create(&self, tenant_id: &str, customer_id: &str) -> Result<Cart, PersistenceError> {
        let mut tables = self.tables.write();
        if tables.open_cart(tenant_id, customer_id).is_some() {
            return Err(PersistenceError::Conflict(format!(
                "{}/{} already has an open cart",
                tenant_id, customer_id
            )));
        }
        let cart = Cart::new(tenant_id, customer_id);
        tables.store(cart.clone());
        Ok(cart)
    }

    async fn update(&self, cart: &Cart, patch: &CartPatch) -> Result<Cart, PersistenceError> {
        let mut tables = self.tables.write();
        let stored = tables
            .carts
            .get(&cart.id)
            .ok_or_else(|| PersistenceError::NotFound(format!("cart {}", cart.id)))?;

        if stored.version != cart.version {
            return Err(PersistenceError::Conflict(format!(
                "cart {} changed since version {}",
                cart.id, cart.version
            )));
        }

        let next = next_revision(stored, patch);
        tables.store(next.clone());
        Ok(next)
    }

    async fn clear(&self, tenant_id: &str, customer_id: &str) -> Result<(), PersistenceError> {
        let mut tables = self.tables.write();
        if let Some(cart) = tables.open_cart(tenant_id, customer_id) {
            let next = next_revision(cart, &clear_patch());
            tables.store(next);
        }
        Ok(())
    }
}
