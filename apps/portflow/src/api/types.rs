//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Batch endpoints answer with one [`ItemResult`] per request item, in request
//! order, so a client can see which items failed and why.

use axum::http::StatusCode;
use portflow_core::{
    CheckedComponent, CreateNodeRequest, ErrorKind, LinkRequest, NodeIdentifier, PortflowError,
    ResolvedComponent, StateRequest, UpdateNodeRequest,
};
use serde::{Deserialize, Serialize};

/// Largest batch accepted by any endpoint.
pub const MAX_BATCH_SIZE: usize = 1024;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for an error class.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::StateIndex => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Resolution => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error body for whole-request failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
            status: status.as_u16(),
        }
    }

    pub fn from_error(error: &PortflowError) -> Self {
        Self::new(status_for(error.kind()), error.to_string())
    }
}

// =============================================================================
// PER-ITEM ENVELOPE
// =============================================================================

/// Outcome of one batch item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ItemResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    pub error: Option<String>,
    pub status: u16,
}

impl<T> From<Result<T, PortflowError>> for ItemResult<T> {
    fn from(result: Result<T, PortflowError>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                value: Some(value),
                error: None,
                status: StatusCode::OK.as_u16(),
            },
            Err(e) => Self {
                success: false,
                value: None,
                error: Some(e.to_string()),
                status: status_for(e.kind()).as_u16(),
            },
        }
    }
}

/// Per-item results of a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse<T> {
    /// True only when every item succeeded.
    pub success: bool,
    pub results: Vec<ItemResult<T>>,
}

impl<T> BatchResponse<T> {
    pub fn from_results(results: Vec<Result<T, PortflowError>>) -> Self {
        let results: Vec<ItemResult<T>> = results.into_iter().map(ItemResult::from).collect();
        Self {
            success: results.iter().all(|r| r.success),
            results,
        }
    }
}

/// Batch answer for operations with nothing to return; `value` is `null`.
pub type AckResponse = BatchResponse<()>;

// =============================================================================
// BATCH REQUESTS
// =============================================================================

/// `POST /nodes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodesRequest {
    pub nodes: Vec<CreateNodeRequest>,
}

/// `POST /nodes/update`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNodesRequest {
    pub updates: Vec<UpdateNodeRequest>,
}

/// `POST /nodes/delete` and `POST /process`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdsRequest {
    pub ids: Vec<NodeIdentifier>,
}

/// `POST /nodes/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatesRequest {
    pub requests: Vec<StateRequest>,
}

/// `POST /link`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksRequest {
    pub links: Vec<LinkRequest>,
}

/// Reject oversized batches before taking the session lock.
pub fn check_batch_size(len: usize) -> Result<(), PortflowError> {
    if len > MAX_BATCH_SIZE {
        return Err(PortflowError::InvalidRequest(format!(
            "batch of {} items exceeds maximum {}",
            len, MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// RESOLUTION RESPONSES
// =============================================================================

/// `POST /configure`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureResponse {
    pub success: bool,
    pub components: Vec<ResolvedComponent>,
    /// Every valid selection when the failing component was ambiguous.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Vec<usize>>,
    pub error: Option<String>,
    pub status: u16,
}

impl ConfigureResponse {
    pub fn success(components: Vec<ResolvedComponent>) -> Self {
        Self {
            success: true,
            components,
            candidates: vec![],
            error: None,
            status: StatusCode::OK.as_u16(),
        }
    }

    pub fn error(error: &PortflowError) -> Self {
        let candidates = match error {
            PortflowError::Ambiguous(valid) => valid.clone(),
            _ => vec![],
        };
        Self {
            success: false,
            components: vec![],
            candidates,
            error: Some(error.to_string()),
            status: status_for(error.kind()).as_u16(),
        }
    }
}

/// `POST /check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub success: bool,
    pub components: Vec<CheckedComponent>,
    pub error: Option<String>,
}

impl CheckResponse {
    pub fn success(components: Vec<CheckedComponent>) -> Self {
        Self {
            success: true,
            components,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            components: vec![],
            error: Some(msg.into()),
        }
    }
}
