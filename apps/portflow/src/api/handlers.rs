//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Reads take the session read lock; anything that creates, links, resolves
//! or runs nodes takes the write lock for the whole batch.

use super::{
    AppState,
    types::{
        AckResponse, BatchResponse, CheckResponse, ConfigureResponse, CreateNodesRequest,
        ErrorResponse, HealthResponse, LinksRequest, NodeIdsRequest, NodeStatesRequest,
        UpdateNodesRequest, check_batch_size, status_for,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portflow_core::{NodeIdentifier, NodeState, PortflowError};

// =============================================================================
// HEALTH / INTROSPECTION
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Node, link and resolution counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    (StatusCode::OK, Json(session.status()))
}

/// Every registered node type with its ports and context states.
pub async fn describe_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    (StatusCode::OK, Json(session.describe()))
}

/// View one node by numeric id.
pub async fn node_view_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Response {
    let session = state.session.read().await;
    let Some(identifier) = session.node_ids().into_iter().find(|n| n.id == id) else {
        return error_response(&PortflowError::IdentifierNotFound(NodeIdentifier::new(
            id, "unknown",
        )));
    };

    match session.node_view(&identifier) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// NODE LIFECYCLE
// =============================================================================

pub async fn create_nodes_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateNodesRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.nodes.len()) {
        return error_response(&e);
    }
    let mut session = state.session.write().await;
    let results = session.create_nodes(&request.nodes);
    (StatusCode::OK, Json(BatchResponse::from_results(results))).into_response()
}

pub async fn update_nodes_handler(
    State(state): State<AppState>,
    Json(request): Json<UpdateNodesRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.updates.len()) {
        return error_response(&e);
    }
    let mut session = state.session.write().await;
    let results = session.update_nodes(&request.updates);
    (StatusCode::OK, Json(AckResponse::from_results(results))).into_response()
}

pub async fn delete_nodes_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeIdsRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.ids.len()) {
        return error_response(&e);
    }
    let mut session = state.session.write().await;
    let results = session.delete_nodes(&request.ids);
    (StatusCode::OK, Json(AckResponse::from_results(results))).into_response()
}

pub async fn node_states_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeStatesRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.requests.len()) {
        return error_response(&e);
    }
    let session = state.session.read().await;
    let results = session.node_states(&request.requests);
    (
        StatusCode::OK,
        Json(BatchResponse::<NodeState>::from_results(results)),
    )
        .into_response()
}

// =============================================================================
// LINKING & RESOLUTION
// =============================================================================

pub async fn link_handler(
    State(state): State<AppState>,
    Json(request): Json<LinksRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.links.len()) {
        return error_response(&e);
    }
    let mut session = state.session.write().await;
    let results = session.link_many(&request.links);
    (StatusCode::OK, Json(AckResponse::from_results(results))).into_response()
}

/// Resolve every connected component and commit the selections.
pub async fn configure_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.configure() {
        Ok(components) => (StatusCode::OK, Json(ConfigureResponse::success(components))),
        Err(e) => (status_for(e.kind()), Json(ConfigureResponse::error(&e))),
    }
}

/// List every valid selection per component without committing any.
pub async fn check_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.check() {
        Ok(components) => (StatusCode::OK, Json(CheckResponse::success(components))),
        Err(e) => (
            status_for(e.kind()),
            Json(CheckResponse::error(e.to_string())),
        ),
    }
}

pub async fn process_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeIdsRequest>,
) -> Response {
    if let Err(e) = check_batch_size(request.ids.len()) {
        return error_response(&e);
    }
    let mut session = state.session.write().await;
    let results = session.process_many(&request.ids);
    (StatusCode::OK, Json(AckResponse::from_results(results))).into_response()
}

// =============================================================================
// HELPERS
// =============================================================================

fn error_response(error: &PortflowError) -> Response {
    (
        status_for(error.kind()),
        Json(ErrorResponse::from_error(error)),
    )
        .into_response()
}
