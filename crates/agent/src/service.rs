//! Conversation routing
//!
//! Resolves the tenant, runs the order flow and answers everything the flow
//! does not handle through the knowledge responder. Replies are sent through
//! the messaging gateway with the tenant's device token.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use wa_agent_core::{BusinessProfile, InboundMessage};
use wa_agent_llm::KnowledgeResponder;
use wa_agent_persistence::BusinessDirectory;
use wa_agent_tools::MessagingGateway;

use crate::flow::{OrderFlow, OrderReply};

/// Which path produced the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// No tenant owns the destination number
    UnknownTenant,
    /// Echo of the tenant's own outgoing message
    OwnMessage,
    EmptyMessage,
    Order,
    Knowledge,
    /// Order flow unavailable, answered through the knowledge path
    Bypass,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTenant => "unknown_tenant",
            Self::OwnMessage => "own_message",
            Self::EmptyMessage => "empty_message",
            Self::Order => "order",
            Self::Knowledge => "knowledge",
            Self::Bypass => "bypass",
        }
    }
}

/// Result of handling one inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationOutcome {
    pub route: Route,
    pub tenant_id: Option<String>,
    /// Text sent (or attempted) back to the customer by this service
    pub reply: Option<String>,
    /// Whether `reply` reached the messaging gateway successfully
    pub sent: bool,
}

impl ConversationOutcome {
    fn ignored(route: Route, tenant_id: Option<String>) -> Self {
        Self {
            route,
            tenant_id,
            reply: None,
            sent: false,
        }
    }
}

pub struct ConversationService {
    businesses: Arc<dyn BusinessDirectory>,
    flow: OrderFlow,
    responder: KnowledgeResponder,
    messaging: Arc<dyn MessagingGateway>,
}

impl ConversationService {
    pub fn new(
        businesses: Arc<dyn BusinessDirectory>,
        flow: OrderFlow,
        responder: KnowledgeResponder,
        messaging: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            businesses,
            flow,
            responder,
            messaging,
        }
    }

    pub fn flow(&self) -> &OrderFlow {
        &self.flow
    }

    /// Handle one inbound message end to end. Never fails; every outcome is
    /// logged and reported.
    pub async fn handle(&self, message: &InboundMessage) -> ConversationOutcome {
        let start = Instant::now();

        let profile = match self.businesses.find_by_whatsapp_number(&message.recipient).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::info!(recipient = %message.recipient, "No tenant for destination number");
                return ConversationOutcome::ignored(Route::UnknownTenant, None);
            }
            Err(e) => {
                tracing::error!(recipient = %message.recipient, error = %e, "Tenant lookup failed");
                return ConversationOutcome::ignored(Route::UnknownTenant, None);
            }
        };

        if message.sender == profile.whatsapp_number {
            return ConversationOutcome::ignored(Route::OwnMessage, Some(profile.tenant_id));
        }
        if message.text.trim().is_empty() {
            return ConversationOutcome::ignored(Route::EmptyMessage, Some(profile.tenant_id));
        }

        let (route, reply) = match self.flow.handle(&profile, message).await {
            OrderReply::Text(text) => (Route::Order, Some(text)),
            OrderReply::Delivered => (Route::Order, None),
            OrderReply::NotOrdering => (Route::Knowledge, Some(self.knowledge_reply(&profile, message).await)),
            OrderReply::Bypass => (Route::Bypass, Some(self.knowledge_reply(&profile, message).await)),
        };

        let sent = match reply.as_deref() {
            Some(text) => self.send(&profile, &message.sender, text).await,
            None => true,
        };

        counter!("conversation_messages_total", "route" => route.as_str()).increment(1);
        histogram!("conversation_reply_duration_seconds", "route" => route.as_str())
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            tenant_id = %profile.tenant_id,
            customer = %message.sender,
            route = route.as_str(),
            sent,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Message handled"
        );

        ConversationOutcome {
            route,
            tenant_id: Some(profile.tenant_id),
            reply,
            sent,
        }
    }

    async fn knowledge_reply(&self, profile: &BusinessProfile, message: &InboundMessage) -> String {
        self.responder
            .reply(profile, &message.text, message.sender_name.as_deref())
            .await
    }

    async fn send(&self, profile: &BusinessProfile, to: &str, text: &str) -> bool {
        match self
            .messaging
            .send(to, text, profile.device_token.as_deref())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(tenant_id = %profile.tenant_id, customer = %to, error = %e, "Reply delivery failed");
                counter!("order_adapter_failures_total", "adapter" => "messaging_reply").increment(1);
                false
            }
        }
    }
}
