//! Prometheus metrics
//!
//! The recorder is process-global, so it is installed once and the handle is
//! shared with every router built afterwards.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::state::AppState;
use crate::ServerError;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder (idempotent)
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Suffix("duration_seconds".to_string()),
                    LATENCY_BUCKETS,
                )
                .map_err(|e| ServerError::Metrics(e.to_string()))?
                .install_recorder()
                .map_err(|e| ServerError::Metrics(e.to_string()))?;
            describe();
            Ok(handle)
        })
        .cloned()
}

fn describe() {
    describe_counter!("webhook_requests_total", "Webhook deliveries by outcome");
    describe_counter!("conversation_messages_total", "Handled messages by reply route");
    describe_histogram!(
        "conversation_reply_duration_seconds",
        Unit::Seconds,
        "Time from webhook receipt to reply hand-off"
    );
    describe_counter!("order_step_transitions_total", "Cart step changes");
    describe_counter!("orders_created_total", "Orders handed to payment");
    describe_counter!("orders_cancelled_total", "Carts closed before payment, by reason");
    describe_counter!("orders_paid_total", "Orders settled by the payment gateway");
    describe_counter!("payment_notifications_total", "Payment gateway notifications by outcome");
    describe_counter!("order_adapter_failures_total", "External adapter failures by adapter");
    describe_counter!("order_flow_bypass_total", "Messages that skipped ordering because of store failures");
}

pub fn record_webhook(outcome: &'static str) {
    counter!("webhook_requests_total", "outcome" => outcome).increment(1);
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics disabled\n".to_string(),
        ),
    }
}
