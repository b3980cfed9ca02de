//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Cart store, catalog and business directory backend
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// WhatsApp gateway (Fonnte)
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Payment gateway (Midtrans)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// QR image rendering
    #[serde(default)]
    pub qr: QrConfig,

    /// Knowledge reply path
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub ordering: OrderingConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_ordering()?;
        self.validate_llm()?;
        self.validate_gateways()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_ordering(&self) -> Result<(), ConfigError> {
        if self.ordering.max_item_quantity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ordering.max_item_quantity".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.ordering.payment_expiry_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ordering.payment_expiry_minutes".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.ordering.fallback_menu.is_empty() {
            tracing::warn!("ordering.fallback_menu is empty; tenants without products get a bare header");
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", llm.temperature),
            });
        }

        if llm.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.retrieval_top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Gateway credentials are required in production, optional elsewhere
    /// (the stub adapters are used when they are missing)
    fn validate_gateways(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.payment.server_key.as_deref().map_or(true, str::is_empty) {
            if self.environment.is_production() {
                errors.push("payment.server_key: required in production");
            } else {
                tracing::warn!("payment.server_key not configured, using stub payment gateway");
            }
        }

        if self.messaging.device_token.as_deref().map_or(true, str::is_empty) {
            if self.environment.is_production() {
                errors.push("messaging.device_token: required in production");
            } else {
                tracing::warn!("messaging.device_token not configured, using stub messaging gateway");
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "gateways".to_string(),
                message: format!("Gateway validation failed:\n  - {}", errors.join("\n  - ")),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,

    /// YAML file of businesses, products and knowledge documents loaded at
    /// startup
    #[serde(default)]
    pub seed_path: Option<String>,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}

fn default_scylla_keyspace() -> String {
    "wa_agent".to_string()
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
            seed_path: None,
        }
    }
}

/// WhatsApp messaging gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_fonnte_url")]
    pub base_url: String,

    /// Default device token, used when a tenant has none of its own
    #[serde(default)]
    pub device_token: Option<String>,

    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
}

fn default_fonnte_url() -> String {
    "https://api.fonnte.com".to_string()
}

fn default_gateway_timeout() -> u64 {
    15
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            base_url: default_fonnte_url(),
            device_token: None,
            timeout_seconds: default_gateway_timeout(),
        }
    }
}

/// Payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default = "default_midtrans_url")]
    pub base_url: String,

    /// Midtrans server key (HTTP basic auth username)
    #[serde(default)]
    pub server_key: Option<String>,

    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,

    /// Prefix of generated payment order ids
    #[serde(default = "default_order_id_prefix")]
    pub order_id_prefix: String,
}

fn default_midtrans_url() -> String {
    "https://api.sandbox.midtrans.com".to_string()
}

fn default_order_id_prefix() -> String {
    "ORDER".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: default_midtrans_url(),
            server_key: None,
            timeout_seconds: default_gateway_timeout(),
            order_id_prefix: default_order_id_prefix(),
        }
    }
}

/// QR image rendering service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    #[serde(default = "default_qr_url")]
    pub base_url: String,

    /// Rendered image edge length in pixels
    #[serde(default = "default_qr_size")]
    pub size: u32,
}

fn default_qr_url() -> String {
    "https://quickchart.io/qr".to_string()
}

fn default_qr_size() -> u32 {
    300
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            base_url: default_qr_url(),
            size: default_qr_size(),
        }
    }
}

/// OpenAI-compatible chat backend for the knowledge reply path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Knowledge documents passed to the model as context
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    400
}
fn default_temperature() -> f32 {
    0.4
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_top_k() -> usize {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            retrieval_top_k: default_top_k(),
        }
    }
}

/// Order flow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Largest quantity accepted from free text for one product
    #[serde(default = "default_max_quantity")]
    pub max_item_quantity: u32,

    /// How long inbound message ids are remembered for duplicate detection
    #[serde(default = "default_dedup_ttl")]
    pub webhook_dedup_ttl_secs: u64,

    /// Menu lines shown when a tenant's catalog is empty
    #[serde(default = "default_fallback_menu")]
    pub fallback_menu: Vec<String>,

    /// Minutes a QRIS charge stays payable; an unpaid cart closes after this
    #[serde(default = "default_payment_expiry")]
    pub payment_expiry_minutes: u32,
}

fn default_max_quantity() -> u32 {
    50
}

fn default_dedup_ttl() -> u64 {
    600
}

fn default_payment_expiry() -> u32 {
    15
}

fn default_fallback_menu() -> Vec<String> {
    [
        "🍣 Salmon Roll - Rp 50.000",
        "🍣 Tuna Roll - Rp 45.000",
        "🍱 Chicken Katsu Bento - Rp 40.000",
        "🍜 Ramen - Rp 38.000",
        "🥤 Ocha - Rp 10.000",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            max_item_quantity: default_max_quantity(),
            webhook_dedup_ttl_secs: default_dedup_ttl(),
            fallback_menu: default_fallback_menu(),
            payment_expiry_minutes: default_payment_expiry(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// OTLP endpoint for traces (requires the `telemetry` feature)
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            otlp_endpoint: None,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` in the working directory plus environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from a config directory.
///
/// Sources, later overriding earlier: `<dir>/default.*`, `<dir>/<env>.*`,
/// then `WA_AGENT__SECTION__KEY` environment variables.
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("WA_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.ordering.max_item_quantity, 50);
        assert_eq!(settings.ordering.payment_expiry_minutes, 15);
        assert!(!settings.persistence.enabled);
        assert!(!settings.ordering.fallback_menu.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate_server().is_err());
        settings.server.port = 8080;

        settings.server.timeout_seconds = 0;
        assert!(settings.validate_server().is_err());
    }

    #[test]
    fn test_ordering_validation() {
        let mut settings = Settings::default();
        settings.ordering.max_item_quantity = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.ordering.payment_expiry_minutes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_llm_temperature_range() {
        let mut settings = Settings::default();
        settings.llm.temperature = 2.5;
        assert!(settings.validate_llm().is_err());
        settings.llm.temperature = -0.1;
        assert!(settings.validate_llm().is_err());
        settings.llm.temperature = 0.0;
        assert!(settings.validate_llm().is_ok());
    }

    #[test]
    fn test_production_requires_gateway_credentials() {
        let mut settings = Settings {
            environment: RuntimeEnvironment::Production,
            ..Default::default()
        };
        assert!(settings.validate_gateways().is_err());

        settings.payment.server_key = Some("SB-Mid-server-xyz".to_string());
        assert!(settings.validate_gateways().is_err());

        settings.messaging.device_token = Some("device-token".to_string());
        assert!(settings.validate_gateways().is_ok());
    }

    #[test]
    fn test_development_allows_missing_credentials() {
        let settings = Settings::default();
        assert!(settings.validate_gateways().is_ok());
    }

    #[test]
    fn test_load_from_yaml_with_env_override_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            "server:\n  port: 9000\nordering:\n  max_item_quantity: 20\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "[server]\nport = 9100\n\n[persistence]\nkeyspace = \"wa_staging\"\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.ordering.max_item_quantity, 20);
        assert_eq!(settings.persistence.keyspace, "wa_staging");
        assert_eq!(settings.payment.order_id_prefix, "ORDER");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            "ordering:\n  max_item_quantity: 0\n",
        )
        .unwrap();

        assert!(load_settings_from(dir.path(), None).is_err());
    }
}
