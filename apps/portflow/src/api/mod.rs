//! # portflow HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Node, link and resolution counts
//! - `GET /describe` - Registered node types
//! - `POST /nodes` - Create nodes (batch)
//! - `GET /nodes/{id}` - Ports, effective roles and selected state of one node
//! - `POST /nodes/update` - Update node parameters (batch)
//! - `POST /nodes/delete` - Delete nodes (batch)
//! - `POST /nodes/state` - Read node state fields (batch)
//! - `POST /link` - Link ports (batch)
//! - `POST /configure` - Resolve and commit every component
//! - `POST /check` - List valid selections without committing
//! - `POST /process` - Run node behaviors (batch)
//!
//! ## Security Configuration
//!
//! - `cors_origins` / `PORTFLOW_CORS_ORIGINS`: allowed origins, or "*" for all (default: localhost only)
//! - `rate_limit` / `PORTFLOW_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `PORTFLOW_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AckResponse, BatchResponse, CheckResponse, ConfigureResponse, CreateNodesRequest,
    ErrorResponse, HealthResponse, ItemResult, LinksRequest, MAX_BATCH_SIZE, NodeIdsRequest,
    NodeStatesRequest, UpdateNodesRequest, status_for,
};

use crate::config::PortflowConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use portflow_core::{PortflowError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body ceiling (2 MB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: one live session plus the settings it was started with.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub config: Arc<PortflowConfig>,
}

impl AppState {
    /// State with default settings.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_config(session, PortflowConfig::default())
    }

    #[must_use]
    pub fn with_config(session: Session, config: PortflowConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from configured origins.
///
/// - `["*"]`: allows all origins
/// - `None` or no parsable origin: localhost only
/// - otherwise: exactly the listed origins
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some([only]) if only == "*" => {
            tracing::warn!("CORS: allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: no valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: no origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
/// 5. Authentication (if `PORTFLOW_API_KEY` is set)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.config.cors_origins.as_deref());

    let rate_limit = state.config.rate_limit;
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set PORTFLOW_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/describe", get(handlers::describe_handler))
        .route("/nodes", post(handlers::create_nodes_handler))
        .route("/nodes/{id}", get(handlers::node_view_handler))
        .route("/nodes/update", post(handlers::update_nodes_handler))
        .route("/nodes/delete", post(handlers::delete_nodes_handler))
        .route("/nodes/state", post(handlers::node_states_handler))
        .route("/link", post(handlers::link_handler))
        .route("/configure", post(handlers::configure_handler))
        .route("/check", post(handlers::check_handler))
        .route("/process", post(handlers::process_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `session` on the configured address until the process stops.
pub async fn run_server(config: PortflowConfig, session: Session) -> Result<(), PortflowError> {
    let addr = config.bind_address();
    let state = AppState::with_config(session, config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PortflowError::Io(format!("bind failed: {}", e)))?;

    tracing::info!("portflow HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| PortflowError::Io(format!("server error: {}", e)))
}

