//! MedSearch API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use medsearch_chat::{GroundingEngine, OpenAiGenerator};
use medsearch_common::{
    auth::TokenVerifier,
    config::{AppConfig, ObservabilityConfig},
    metrics, AppError,
};
use medsearch_search::{
    providers::{ClinicalTrialsClient, OpenFdaClient},
    AggregationEngine, QueryCache, QueryCacheConfig,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub engine: Arc<AggregationEngine>,
    pub cache: Arc<QueryCache>,
    /// None when no generation backend is configured; the chat surface
    /// then answers 503 while search keeps working.
    pub grounding: Option<Arc<GroundingEngine>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting MedSearch API Gateway v{}", medsearch_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    // Tokens come from an external identity provider; without its secret
    // nothing can be verified.
    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret is required".to_string(),
        })?;
    let verifier = Arc::new(TokenVerifier::new(&jwt_secret));

    // Wire the search pipeline
    let trials = Arc::new(ClinicalTrialsClient::new(&config.trials)?);
    let drugs = Arc::new(OpenFdaClient::new(&config.fda)?);
    let cache = Arc::new(QueryCache::new(QueryCacheConfig {
        ttl: config.cache_ttl(),
        capacity: config.cache.capacity,
    }));
    let engine = Arc::new(AggregationEngine::new(
        trials,
        drugs,
        cache.clone(),
        &config,
    ));

    // Wire the chat surface when a generation backend is configured
    let grounding = if config.generation.api_key.is_some() {
        let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
        Some(Arc::new(GroundingEngine::new(
            generator,
            &config.generation,
        )))
    } else {
        tracing::warn!("generation.api_key not set, chat surface disabled");
        None
    };

    let state = AppState {
        config: config.clone(),
        verifier,
        engine,
        cache,
        grounding,
    };

    // Build the router
    let app = create_router(state, metrics_handle);

    // Start the server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Authenticated API routes
    let mut api_routes = Router::new()
        .route("/search", post(handlers::search::search))
        .route("/chat", post(handlers::chat::chat))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.route_layer(axum::middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
            }
        }));
    }

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(move || async move { metrics_handle.render() }))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
