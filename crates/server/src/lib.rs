//! WhatsApp Ordering Agent Server
//!
//! Receives messaging webhooks and payment notifications, and exposes health, readiness, metrics and
//! support endpoints.

pub mod dedup;
pub mod http;
pub mod metrics;
pub mod payments;
pub mod seed;
pub mod state;
pub mod webhook;

pub use dedup::MessageDedup;
pub use http::create_router;
pub use metrics::{init_metrics, record_webhook};
pub use seed::SeedData;
pub use state::AppState;
pub use webhook::{WebhookOutcome, WebhookPayload};

use thiserror::Error;
use wa_agent_persistence::PersistenceError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Seed data error: {0}")]
    Seed(String),

    #[error("Integration setup error: {0}")]
    Integration(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<wa_agent_config::ConfigError> for ServerError {
    fn from(err: wa_agent_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<wa_agent_tools::IntegrationError> for ServerError {
    fn from(err: wa_agent_tools::IntegrationError) -> Self {
        ServerError::Integration(err.to_string())
    }
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Persistence(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
