//! WhatsApp Ordering Agent Server Entry Point

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use wa_agent_config::{load_settings, Settings};
use wa_agent_llm::{InMemoryKnowledgeBase, KnowledgeResponder, LlmBackend, OpenAIBackend, OpenAIConfig};
use wa_agent_persistence::{PersistenceLayer, ScyllaConfig};
use wa_agent_server::{create_router, init_metrics, AppState, SeedData};
use wa_agent_tools::Integrations;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("WA_AGENT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting WhatsApp Ordering Agent v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        match init_metrics() {
            Ok(handle) => {
                tracing::info!("Initialized Prometheus metrics at /metrics");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let persistence = if config.persistence.enabled {
        tracing::info!("Initializing ScyllaDB persistence layer...");
        let scylla_config = ScyllaConfig {
            hosts: config.persistence.scylla_hosts.clone(),
            keyspace: config.persistence.keyspace.clone(),
            replication_factor: config.persistence.replication_factor,
        };
        match wa_agent_persistence::init(scylla_config).await {
            Ok(layer) => {
                tracing::info!(
                    hosts = ?config.persistence.scylla_hosts,
                    keyspace = %config.persistence.keyspace,
                    "ScyllaDB persistence initialized"
                );
                layer
            }
            Err(e) if config.environment.is_production() => {
                tracing::error!(error = %e, "Failed to initialize ScyllaDB");
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(
                    "Failed to initialize ScyllaDB: {}. Falling back to in-memory.",
                    e
                );
                PersistenceLayer::in_memory()
            }
        }
    } else {
        tracing::info!("Persistence disabled, using in-memory stores");
        PersistenceLayer::in_memory()
    };

    let knowledge = Arc::new(InMemoryKnowledgeBase::new());
    if let Some(path) = config.persistence.seed_path.as_deref().filter(|p| !p.is_empty()) {
        SeedData::load(Path::new(path))?
            .apply(&persistence, &knowledge)
            .await?;
    }

    let integrations = Integrations::from_settings(&config)?;
    let responder = build_responder(&config, knowledge);

    let mut state = AppState::new(config.clone(), persistence, integrations, responder);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    tracing::info!(
        store = state.persistence.mode(),
        dedup_ttl_secs = config.ordering.webhook_dedup_ttl_secs,
        "Initialized application state"
    );

    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                state.sweep();
            }
        })
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Knowledge replies, LLM-backed when configured
fn build_responder(config: &Settings, knowledge: Arc<InMemoryKnowledgeBase>) -> KnowledgeResponder {
    let responder = KnowledgeResponder::new(knowledge, config.llm.retrieval_top_k);
    if !config.llm.enabled {
        tracing::info!("LLM disabled, knowledge replies use retrieved snippets");
        return responder;
    }

    match OpenAIBackend::new(OpenAIConfig::from(&config.llm)) {
        Ok(backend) => {
            tracing::info!(model = %backend.model_name(), endpoint = %config.llm.endpoint, "LLM backend initialized");
            responder.with_backend(Arc::new(backend))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM backend unavailable, using retrieved snippets");
            responder
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn env_filter(config: &Settings) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("wa_agent={},tower_http=debug", level).into()
    })
}

/// Initialize tracing (with optional OpenTelemetry when feature enabled)
#[cfg(feature = "telemetry")]
fn init_tracing(config: &Settings) {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;

    let subscriber = tracing_subscriber::registry().with(env_filter(config));
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    if let Some(otlp_endpoint) = &config.observability.otlp_endpoint {
        match opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otlp_endpoint)
            .build()
        {
            Ok(exporter) => {
                let provider = opentelemetry_sdk::trace::TracerProvider::builder()
                    .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                    .with_config(opentelemetry_sdk::trace::Config::default().with_resource(
                        opentelemetry_sdk::Resource::new(vec![
                            opentelemetry::KeyValue::new("service.name", "wa-agent"),
                            opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        ]),
                    ))
                    .build();
                let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("wa-agent"));
                opentelemetry::global::set_tracer_provider(provider);
                subscriber.with(fmt_layer).with(otel_layer).init();
                tracing::info!(endpoint = %otlp_endpoint, "OpenTelemetry tracing enabled");
                return;
            }
            Err(e) => eprintln!("Failed to initialize OpenTelemetry: {}. Falling back.", e),
        }
    }
    subscriber.with(fmt_layer).init();
}

/// Initialize tracing (console only - telemetry feature disabled)
#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &Settings) {
    let subscriber = tracing_subscriber::registry().with(env_filter(config));
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
