//! ScyllaDB client and connection management

use crate::error::PersistenceError;
use crate::schema;
use scylla::frame::response::result::{CqlValue, Row};
use scylla::{Session, SessionBuilder};
use std::sync::Arc;

/// ScyllaDB configuration
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u8,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "wa_agent".to_string(),
            replication_factor: 1,
        }
    }
}

/// ScyllaDB client wrapper
#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    config: ScyllaConfig,
}

impl ScyllaClient {
    /// Connect to ScyllaDB cluster
    pub async fn connect(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        tracing::info!(hosts = ?config.hosts, keyspace = %config.keyspace, "Connecting to ScyllaDB");

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .build()
            .await?;

        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }

    /// Ensure keyspace and tables exist
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::create_keyspace(
            &self.session,
            &self.config.keyspace,
            self.config.replication_factor,
        )
        .await?;
        schema::create_tables(&self.session, &self.config.keyspace).await?;
        tracing::info!(keyspace = %self.config.keyspace, "Schema ensured");
        Ok(())
    }

    /// Cheap round trip used by readiness checks
    pub async fn ping(&self) -> Result<(), PersistenceError> {
        self.session
            .query_unpaged("SELECT release_version FROM system.local", &[])
            .await?;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyspace(&self) -> &str {
        &self.config.keyspace
    }
}

/// Read the `[applied]` flag of a lightweight-transaction result
pub(crate) fn lwt_applied(rows: Option<Vec<Row>>) -> Result<bool, PersistenceError> {
    let row = rows
        .and_then(|rows| rows.into_iter().next())
        .ok_or_else(|| PersistenceError::InvalidData("LWT returned no rows".to_string()))?;

    match row.columns.first() {
        Some(Some(CqlValue::Boolean(applied))) => Ok(*applied),
        other => Err(PersistenceError::InvalidData(format!(
            "Unexpected LWT [applied] column: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lwt_applied() {
        let applied = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        assert!(lwt_applied(Some(vec![applied])).unwrap());

        let rejected = Row {
            columns: vec![Some(CqlValue::Boolean(false)), Some(CqlValue::BigInt(7))],
        };
        assert!(!lwt_applied(Some(vec![rejected])).unwrap());

        assert!(lwt_applied(None).is_err());
        assert!(lwt_applied(Some(vec![Row { columns: vec![None] }])).is_err());
    }
}
