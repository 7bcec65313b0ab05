//! Gateway errors and their plain-text HTTP responses.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use sluice_cluster::LocateError;
use sluice_store::StoreError;
use sluice_types::{InvalidKey, NodeId};

/// Errors returned by gateway handlers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The object ID failed validation.
    #[error("Invalid ID, must be alphanumeric and up to 32 characters")]
    InvalidKey(#[source] InvalidKey),

    /// The directory resolved a key to a node it holds no handle for.
    #[error("Failed to find S3 backend ID")]
    RoutingInconsistency(#[source] LocateError),

    /// The bucket could not be checked or created.
    #[error("Failed to ensure S3 bucket {bucket:?} existence on {node:?}: {source}")]
    Bucket {
        /// Bucket name.
        bucket: String,
        /// Owning node.
        node: String,
        /// Backend failure.
        #[source]
        source: StoreError,
    },

    /// The bucket does not exist on the owning node.
    #[error("Bucket {bucket:?} not found on {node:?}")]
    BucketNotFound {
        /// Bucket name.
        bucket: String,
        /// Owning node.
        node: String,
    },

    /// The object does not exist on the owning node.
    #[error("Object {key:?} not found on {node:?}")]
    ObjectNotFound {
        /// Object key.
        key: String,
        /// Owning node.
        node: String,
    },

    /// The node refused access.
    #[error("403 - Forbidden")]
    AccessDenied(#[source] StoreError),

    /// Any other backend failure.
    #[error("{action}: {source}")]
    Backend {
        /// What the gateway was doing.
        action: String,
        /// Backend failure.
        #[source]
        source: StoreError,
    },

    /// A chunked upload grew past the buffering limit.
    #[error("Request body of unknown length exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// No route matched.
    #[error("404 - Not Found")]
    RouteNotFound,
}

impl GatewayError {
    pub(crate) fn bucket(bucket: &str, node: &NodeId, source: StoreError) -> Self {
        Self::Bucket {
            bucket: bucket.to_string(),
            node: node.to_string(),
            source,
        }
    }

    pub(crate) fn backend(action: impl Into<String>, source: StoreError) -> Self {
        Self::Backend {
            action: action.into(),
            source,
        }
    }

    /// Map to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::BucketNotFound { .. } | Self::ObjectNotFound { .. } | Self::RouteNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RoutingInconsistency(_) | Self::Bucket { .. } | Self::Backend { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{self}\n"),
        )
            .into_response()
    }
}
