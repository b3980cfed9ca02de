//! Order-taking agent
//!
//! Features:
//! - Order completeness validation
//! - Order state machine over the persisted cart
//! - WhatsApp response templates
//! - Per-customer serialisation of cart mutations
//! - Conversation routing between the order flow and the knowledge reply path

pub mod flow;
pub mod formatter;
pub mod locks;
pub mod service;
pub mod validator;

pub use flow::{OrderFlow, OrderReply, Settlement};
pub use formatter::ResponseFormatter;
pub use locks::CustomerLocks;
pub use service::{ConversationOutcome, ConversationService, Route};
pub use validator::{NextStep, OrderValidator, RequiredField, ValidationResult};

use thiserror::Error;
use wa_agent_core::CartStep;
use wa_agent_persistence::PersistenceError;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Store error: {0}")]
    Store(PersistenceError),

    #[error("Invalid step transition: {from} -> {to}")]
    InvalidTransition { from: CartStep, to: CartStep },
}

impl AgentError {
    /// Whether retrying against a freshly loaded cart may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Store(e) => e.is_transient(),
            AgentError::InvalidTransition { .. } => false,
        }
    }
}

impl From<PersistenceError> for AgentError {
    fn from(err: PersistenceError) -> Self {
        AgentError::Store(err)
    }
}
