//! Payment gateway notifications
//!
//! Midtrans posts a notification whenever a transaction changes state and
//! keeps retrying until it gets a 2xx. Notifications that can never apply are
//! acknowledged; only store failures ask for a retry.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use metrics::counter;
use serde_json::Value;
use wa_agent_tools::PaymentNotification;

use crate::state::AppState;

/// `POST /payments/midtrans/notification`
pub async fn receive_payment_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let (status, outcome) = process(&state, &body).await;
    counter!("payment_notifications_total", "outcome" => outcome).increment(1);
    (
        status,
        Json(serde_json::json!({
            "status": if status.is_success() { "ok" } else { "error" },
            "outcome": outcome,
        })),
    )
}

async fn process(state: &AppState, body: &[u8]) -> (StatusCode, &'static str) {
    let notification: PaymentNotification = match serde_json::from_slice(body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed payment notification");
            return (StatusCode::BAD_REQUEST, "malformed");
        }
    };

    match state.config.payment.server_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) if !notification.verify_signature(key) => {
            tracing::warn!(order_id = %notification.order_id, "Payment notification signature mismatch");
            return (StatusCode::FORBIDDEN, "bad_signature");
        }
        Some(_) => {}
        None => tracing::debug!("No payment server key, accepting unsigned notification"),
    }

    let (Some(tenant_id), Some(customer)) = (notification.tenant_id(), notification.customer_id())
    else {
        tracing::info!(order_id = %notification.order_id, "Payment notification without cart reference");
        return (StatusCode::OK, "unknown_order");
    };

    let status = notification.status();
    tracing::info!(
        order_id = %notification.order_id,
        tenant_id = %tenant_id,
        transaction_status = %notification.transaction_status,
        status = status.as_str(),
        "Payment notification received"
    );

    match state
        .conversation
        .flow()
        .settle_payment(tenant_id, customer, &notification.order_id, status)
        .await
    {
        Ok(settlement) => (StatusCode::OK, settlement.as_str()),
        Err(e) => {
            tracing::error!(order_id = %notification.order_id, tenant_id = %tenant_id, error = %e, "Payment settlement failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store_error")
        }
    }
}
