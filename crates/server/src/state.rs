//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use wa_agent_agent::{ConversationService, OrderFlow};
use wa_agent_config::Settings;
use wa_agent_llm::KnowledgeResponder;
use wa_agent_persistence::PersistenceLayer;
use wa_agent_tools::Integrations;

use crate::dedup::MessageDedup;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub persistence: PersistenceLayer,
    pub conversation: Arc<ConversationService>,
    pub dedup: Arc<MessageDedup>,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the conversation service over the given stores and adapters
    pub fn new(
        config: Settings,
        persistence: PersistenceLayer,
        integrations: Integrations,
        responder: KnowledgeResponder,
    ) -> Self {
        let flow = OrderFlow::new(
            persistence.carts.clone(),
            persistence.catalog.clone(),
            integrations.clone(),
            &config.ordering,
        );
        let conversation = ConversationService::new(
            persistence.businesses.clone(),
            flow,
            responder,
            integrations.messaging.clone(),
        );
        let dedup = MessageDedup::new(Duration::from_secs(config.ordering.webhook_dedup_ttl_secs));

        Self {
            config: Arc::new(config),
            persistence,
            conversation: Arc::new(conversation),
            dedup: Arc::new(dedup),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Drop expired dedup ids and idle customer locks
    pub fn sweep(&self) {
        self.dedup.purge_expired();
        self.conversation.flow().locks().prune();
        tracing::debug!(
            dedup_entries = self.dedup.len(),
            customer_locks = self.conversation.flow().locks().len(),
            "Swept in-process caches"
        );
    }
}
