//! HTTP Endpoints
//!
//! Webhook and payment notification intake plus operational and support
//! endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use wa_agent_core::normalize_phone;

use crate::metrics::metrics_handler;
use crate::payments::receive_payment_notification;
use crate::state::AppState;
use crate::webhook::receive_webhook;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );
    let timeout = Duration::from_secs(state.config.server.timeout_seconds);

    Router::new()
        .route("/webhook", post(receive_webhook))
        .route("/payments/midtrans/notification", post(receive_payment_notification))
        .route("/api/carts/:tenant_id/:customer_id", get(get_cart))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns a permissive layer (for dev)
/// - If no configured origin parses, only localhost:3000 is allowed
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let mut parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "Invalid CORS origin");
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        parsed_origins.push(HeaderValue::from_static("http://localhost:3000"));
    }

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Liveness plus the store mode
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.persistence.mode(),
    }))
}

/// Ready once the backing store answers
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store_status = match tokio::time::timeout(READY_TIMEOUT, state.persistence.ping()).await {
        Ok(Ok(())) => "ok",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Store ping failed");
            "error"
        }
        Err(_) => "timeout",
    };
    let ready = store_status == "ok";

    (
        if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "store": {
                    "status": store_status,
                    "mode": state.persistence.mode(),
                }
            }
        })),
    )
}

/// Open cart of a customer, read-only
async fn get_cart(
    State(state): State<AppState>,
    Path((tenant_id, customer_id)): Path<(String, String)>,
) -> (StatusCode, Json<serde_json::Value>) {
    let customer_id = normalize_phone(&customer_id);
    match state.persistence.carts.find_open(&tenant_id, &customer_id).await {
        Ok(Some(cart)) => {
            let total = cart.total_amount();
            let mut body = serde_json::to_value(&cart).unwrap_or_default();
            body["total_amount"] = serde_json::json!(total.to_string());
            (StatusCode::OK, Json(body))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "No open cart" })),
        ),
        Err(e) => {
            tracing::error!(tenant_id = %tenant_id, customer = %customer_id, error = %e, "Cart lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Cart store unavailable" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;
    use wa_agent_config::Settings;
    use wa_agent_core::{BusinessProfile, CartPatch, CartStep, Product};
    use wa_agent_llm::{InMemoryKnowledgeBase, KnowledgeResponder};
    use wa_agent_persistence::PersistenceLayer;
    use wa_agent_tools::{Integrations, StubMessagingGateway, StubPaymentGateway};

    const BUSINESS: &str = "628110000000";
    const CUSTOMER: &str = "6281234567890";

    async fn test_state() -> (AppState, Arc<StubMessagingGateway>) {
        test_state_with(Settings::default()).await
    }

    async fn test_state_with(settings: Settings) -> (AppState, Arc<StubMessagingGateway>) {
        let persistence = PersistenceLayer::in_memory();
        persistence
            .businesses
            .upsert(&BusinessProfile::new("sushi-yuk", "Sushi Yuk", BUSINESS))
            .await
            .unwrap();
        persistence
            .catalog
            .upsert(&Product::new("p1", "sushi-yuk", "Salmon Roll", "50000"))
            .await
            .unwrap();

        let messaging = Arc::new(StubMessagingGateway::new());
        let integrations =
            Integrations::with_gateways(Arc::new(StubPaymentGateway::new()), messaging.clone());
        let responder = KnowledgeResponder::new(Arc::new(InMemoryKnowledgeBase::new()), 3);

        let state = AppState::new(settings, persistence, integrations, responder);
        (state, messaging)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    fn webhook(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    const ORDER_ID: &str = "ORDER-toko-1700000000000";
    const SERVER_KEY: &str = "SB-Mid-server-test";
    // SHA-512 of ORDER_ID, "200", "110000.00" and SERVER_KEY
    const SIGNATURE: &str = "03953591c688386873894cf3bbf98826f2e57eb240ded80ce0a24c83f173265d\
                             6ebca2da0ce75bbc25d7a5c2d61b1d84711339c4a8032c0793e4e64c80ec5399";

    async fn put_awaiting_cart(state: &AppState) {
        let carts = &state.persistence.carts;
        let cart = carts.create("sushi-yuk", CUSTOMER).await.unwrap();
        carts
            .update(
                &cart,
                &CartPatch::step(CartStep::AwaitingPayment).with_order_id(ORDER_ID),
            )
            .await
            .unwrap();
    }

    fn notification(order_id: &str, status: &str, signature: &str) -> Request<Body> {
        let body = serde_json::json!({
            "order_id": order_id,
            "transaction_status": status,
            "status_code": "200",
            "gross_amount": "110000.00",
            "signature_key": signature,
            "payment_type": "qris",
            "custom_field1": "sushi-yuk",
            "custom_field2": CUSTOMER
        });
        Request::builder()
            .method("POST")
            .uri("/payments/midtrans/notification")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state().await;
        let (status, body) = send(create_router(state), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_ready() {
        let (state, _) = test_state().await;
        let (status, body) = send(create_router(state), get_request("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["store"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_webhook_order_reply_and_cart_inspection() {
        let (state, messaging) = test_state().await;
        let app = create_router(state);

        let (status, body) = send(
            app.clone(),
            webhook(serde_json::json!({
                "device": BUSINESS,
                "sender": format!("{}@s.whatsapp.net", CUSTOMER),
                "message": "pesan salmon roll 2",
                "id": "m1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "order");

        let sent = messaging.sent_to(CUSTOMER);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Salmon Roll x2"));

        let (status, cart) = send(app.clone(), get_request(&format!("/api/carts/sushi-yuk/{}", CUSTOMER))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["step"], "collecting_items");
        assert_eq!(cart["items"][0]["quantity"], 2);
        assert_eq!(cart["total_amount"], "100000");

        let (status, _) = send(app, get_request("/api/carts/sushi-yuk/6289999999999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_processed_once() {
        let (state, messaging) = test_state().await;
        let app = create_router(state);
        let payload = serde_json::json!({
            "device": BUSINESS,
            "sender": CUSTOMER,
            "message": "pesan salmon roll",
            "id": 42
        });

        let (_, first) = send(app.clone(), webhook(payload.clone())).await;
        let (status, second) = send(app, webhook(payload)).await;

        assert_eq!(first["outcome"], "order");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["outcome"], "duplicate");
        assert_eq!(messaging.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_always_acknowledges() {
        let (state, messaging) = test_state().await;
        let app = create_router(state);

        let malformed = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app.clone(), malformed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "malformed");

        let (status, body) = send(
            app.clone(),
            webhook(serde_json::json!({
                "device": BUSINESS, "sender": CUSTOMER, "message": "", "type": "image"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "non_text");

        let (status, body) = send(
            app.clone(),
            webhook(serde_json::json!({
                "device": "628999999999", "sender": CUSTOMER, "message": "menu"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "unknown_tenant");

        let (_, body) = send(
            app,
            webhook(serde_json::json!({
                "device": BUSINESS, "sender": BUSINESS, "message": "menu"
            })),
        )
        .await;
        assert_eq!(body["outcome"], "own_message");

        assert!(messaging.sent().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_notification_closes_cart() {
        let mut settings = Settings::default();
        settings.payment.server_key = Some(SERVER_KEY.to_string());
        let (state, _) = test_state_with(settings).await;
        put_awaiting_cart(&state).await;
        let app = create_router(state.clone());
        let cart_uri = format!("/api/carts/sushi-yuk/{}", CUSTOMER);

        let (status, body) = send(app.clone(), notification(ORDER_ID, "pending", SIGNATURE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
        let (status, _) = send(app.clone(), get_request(&cart_uri)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app.clone(), notification(ORDER_ID, "settlement", SIGNATURE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "paid");

        let (status, _) = send(app, get_request(&cart_uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.persistence.carts.find_open("sushi-yuk", CUSTOMER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notification_with_bad_signature_is_refused() {
        let mut settings = Settings::default();
        settings.payment.server_key = Some(SERVER_KEY.to_string());
        let (state, _) = test_state_with(settings).await;
        put_awaiting_cart(&state).await;
        let app = create_router(state);

        let (status, body) = send(app.clone(), notification(ORDER_ID, "settlement", "deadbeef")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["outcome"], "bad_signature");

        let (_, cart) = send(app, get_request(&format!("/api/carts/sushi-yuk/{}", CUSTOMER))).await;
        assert_eq!(cart["step"], "awaiting_payment");
    }

    #[tokio::test]
    async fn test_notification_for_other_order_is_ignored() {
        let (state, _) = test_state().await;
        put_awaiting_cart(&state).await;
        let app = create_router(state);

        let (status, body) = send(app.clone(), notification("ORDER-toko-1", "settlement", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");

        let (_, cart) = send(app.clone(), get_request(&format!("/api/carts/sushi-yuk/{}", CUSTOMER))).await;
        assert_eq!(cart["step"], "awaiting_payment");

        let malformed = Request::builder()
            .method("POST")
            .uri("/payments/midtrans/notification")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_expired_notification_clears_cart() {
        let (state, _) = test_state().await;
        put_awaiting_cart(&state).await;
        let app = create_router(state.clone());

        let (status, body) = send(app, notification(ORDER_ID, "expire", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "closed");

        let carts = state.persistence.carts.find_open("sushi-yuk", CUSTOMER).await.unwrap();
        assert!(carts.is_none());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, _) = test_state().await;
        let app = create_router(state.clone());
        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let handle = crate::metrics::init_metrics().unwrap();
        let app = create_router(state.with_metrics(handle));
        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_cors_layer_variants() {
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&["https://dashboard.example".to_string()], true);
        let _ = build_cors_layer(&["bad\norigin".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }
}
