//! Startup seed data
//!
//! A YAML file of tenants, products and knowledge documents, written into
//! the configured stores at startup. Mostly useful with in-memory stores.

use std::path::Path;

use serde::Deserialize;
use wa_agent_core::{normalize_phone, BusinessProfile, Product};
use wa_agent_llm::{InMemoryKnowledgeBase, KnowledgeDocument};
use wa_agent_persistence::PersistenceLayer;

use crate::ServerError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub businesses: Vec<BusinessProfile>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeDocument>,
}

impl SeedData {
    pub fn from_yaml(yaml: &str) -> Result<Self, ServerError> {
        serde_yaml::from_str(yaml).map_err(|e| ServerError::Seed(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Seed(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Write everything into the stores. Numbers are normalised first so
    /// lookups by webhook number match.
    pub async fn apply(
        self,
        persistence: &PersistenceLayer,
        knowledge: &InMemoryKnowledgeBase,
    ) -> Result<(), ServerError> {
        let counts = (self.businesses.len(), self.products.len(), self.knowledge.len());

        for mut profile in self.businesses {
            profile.whatsapp_number = normalize_phone(&profile.whatsapp_number);
            profile.notification_phone = profile
                .notification_phone
                .map(|p| normalize_phone(&p))
                .filter(|p| !p.is_empty());
            persistence.businesses.upsert(&profile).await?;
        }
        for product in &self.products {
            persistence.catalog.upsert(product).await?;
        }
        for document in self.knowledge {
            knowledge.upsert(document);
        }

        tracing::info!(
            businesses = counts.0,
            products = counts.1,
            documents = counts.2,
            "Seed data applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEED: &str = r#"
businesses:
  - tenant_id: sushi-yuk
    business_name: Sushi Yuk
    whatsapp_number: "+62 811-0000-000"
    notification_phone: "0822 2000 0000"
products:
  - id: p1
    tenant_id: sushi-yuk
    name: Salmon Roll
    price: "50000"
    category: Sushi
  - id: p2
    tenant_id: sushi-yuk
    name: Ocha
    price: "8000"
    is_active: false
knowledge:
  - id: hours
    tenant_id: sushi-yuk
    title: Jam Buka
    content: Setiap hari 10.00 - 22.00
"#;

    #[tokio::test]
    async fn test_apply_seed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let seed = SeedData::load(file.path()).unwrap();
        let persistence = PersistenceLayer::in_memory();
        let knowledge = InMemoryKnowledgeBase::new();
        seed.apply(&persistence, &knowledge).await.unwrap();

        let profile = persistence
            .businesses
            .find_by_whatsapp_number("628110000000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.whatsapp_number, "628110000000");
        assert_eq!(profile.notification_phone.as_deref(), Some("6282220000000"));

        let products = persistence.catalog.list_active_products("sushi-yuk").await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Salmon Roll");
        assert_eq!(knowledge.len(), 1);
    }

    #[test]
    fn test_invalid_seed() {
        assert!(matches!(
            SeedData::from_yaml("businesses: 3"),
            Err(ServerError::Seed(_))
        ));
        assert!(SeedData::load(Path::new("/nonexistent/seed.yaml")).is_err());
    }
}
