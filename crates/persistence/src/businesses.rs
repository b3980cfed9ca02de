//! Tenant resolution by WhatsApp number

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use wa_agent_core::{normalize_phone, BusinessProfile};

/// Maps a tenant's WhatsApp number to its business profile
#[async_trait]
pub trait BusinessDirectory: Send + Sync {
    async fn find_by_whatsapp_number(
        &self,
        number: &str,
    ) -> Result<Option<BusinessProfile>, PersistenceError>;

    async fn upsert(&self, profile: &BusinessProfile) -> Result<(), PersistenceError>;
}

/// ScyllaDB implementation of the business directory
#[derive(Clone)]
pub struct ScyllaBusinessDirectory {
    client: ScyllaClient,
}

impl ScyllaBusinessDirectory {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusinessDirectory for ScyllaBusinessDirectory {
    async fn find_by_whatsapp_number(
        &self,
        number: &str,
    ) -> Result<Option<BusinessProfile>, PersistenceError> {
        let number = normalize_phone(number);
        let query = format!(
            "SELECT tenant_id, business_name, device_token, notification_phone, greeting
             FROM {}.businesses WHERE whatsapp_number = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (&number,))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let (tenant_id, business_name, device_token, notification_phone, greeting): (
                    String,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                ) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

                return Ok(Some(BusinessProfile {
                    business_name: business_name.unwrap_or_else(|| tenant_id.clone()),
                    tenant_id,
                    whatsapp_number: number,
                    device_token,
                    notification_phone,
                    greeting,
                }));
            }
        }

        Ok(None)
    }

    async fn upsert(&self, profile: &BusinessProfile) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.businesses (
                whatsapp_number, tenant_id, business_name, device_token,
                notification_phone, greeting
            ) VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    normalize_phone(&profile.whatsapp_number),
                    &profile.tenant_id,
                    &profile.business_name,
                    &profile.device_token,
                    &profile.notification_phone,
                    &profile.greeting,
                ),
            )
            .await?;

        tracing::info!(tenant_id = %profile.tenant_id, "Business profile stored");
        Ok(())
    }
}

/// In-memory business directory keyed by normalised number
#[derive(Default)]
pub struct InMemoryBusinessDirectory {
    profiles: RwLock<HashMap<String, BusinessProfile>>,
}

impl InMemoryBusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<BusinessProfile>) -> Self {
        let directory = Self::new();
        {
            let mut map = directory.profiles.write();
            for profile in profiles {
                map.insert(normalize_phone(&profile.whatsapp_number), profile);
            }
        }
        directory
    }
}

#[async_trait]
impl BusinessDirectory for InMemoryBusinessDirectory {
    async fn find_by_whatsapp_number(
        &self,
        number: &str,
    ) -> Result<Option<BusinessProfile>, PersistenceError> {
        Ok(self.profiles.read().get(&normalize_phone(number)).cloned())
    }

    async fn upsert(&self, profile: &BusinessProfile) -> Result<(), PersistenceError> {
        self.profiles
            .write()
            .insert(normalize_phone(&profile.whatsapp_number), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_normalises_number() {
        let directory = InMemoryBusinessDirectory::with_profiles(vec![BusinessProfile::new(
            "t1",
            "Sushi Yuk",
            "628111000222",
        )]);

        let found = directory
            .find_by_whatsapp_number("0811-1000-222")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tenant_id, "t1");

        assert!(directory
            .find_by_whatsapp_number("628999")
            .await
            .unwrap()
            .is_none());
    }
}
