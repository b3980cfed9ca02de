//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // Carts: one partition per (tenant, customer); completed carts stay as history.
    // total_amount is a denormalised copy written alongside items_json.
    let carts_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.carts (
            tenant_id TEXT,
            customer_id TEXT,
            cart_id UUID,
            step TEXT,
            items_json TEXT,
            total_amount TEXT,
            customer_name TEXT,
            phone_number TEXT,
            outlet_preference TEXT,
            delivery_method TEXT,
            order_id TEXT,
            created_at BIGINT,
            updated_at BIGINT,
            version BIGINT,
            PRIMARY KEY ((tenant_id, customer_id), cart_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(carts_table, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create carts table: {}", e)))?;

    // At most one open cart per customer; written with LWT so creates race safely
    let open_carts_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.open_carts (
            tenant_id TEXT,
            customer_id TEXT,
            cart_id UUID,
            PRIMARY KEY ((tenant_id, customer_id))
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(open_carts_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::Schema(format!("Failed to create open_carts table: {}", e))
        })?;

    let products_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.products (
            tenant_id TEXT,
            product_id TEXT,
            name TEXT,
            price TEXT,
            description TEXT,
            category TEXT,
            is_active BOOLEAN,
            PRIMARY KEY ((tenant_id), product_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(products_table, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create products table: {}", e)))?;

    let businesses_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.businesses (
            whatsapp_number TEXT,
            tenant_id TEXT,
            business_name TEXT,
            device_token TEXT,
            notification_phone TEXT,
            greeting TEXT,
            PRIMARY KEY (whatsapp_number)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(businesses_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::Schema(format!("Failed to create businesses table: {}", e))
        })?;

    tracing::info!("All tables created successfully");
    Ok(())
}
