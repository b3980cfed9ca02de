//! Configuration management for the WhatsApp ordering agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (`WA_AGENT__SECTION__KEY`)
//!
//! Settings are loaded once at startup and injected into components at
//! construction. Business logic never reads the environment itself.

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, LlmConfig, MessagingConfig, ObservabilityConfig,
    OrderingConfig, PaymentConfig, PersistenceConfig, QrConfig, RuntimeEnvironment, ServerConfig,
    Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
