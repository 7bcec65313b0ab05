//! Object request handlers.

use std::io;

use axum::Json;
use axum::body::{Body, HttpBody};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use sluice_cluster::LocateError;
use sluice_store::{ByteStream, StoreError, ensure_bucket, stream_from_bytes};
use sluice_types::ObjectKey;
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::GatewayError;

/// One entry of the fleet-wide listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedObject {
    /// Object key.
    pub key: String,
    /// Node the object lives on.
    pub node: String,
    /// Size in bytes.
    pub size: u64,
}

/// Body of `GET /object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectListing {
    pub objects: Vec<ListedObject>,
}

fn parse_key(id: &str) -> Result<ObjectKey, GatewayError> {
    ObjectKey::parse(id).map_err(GatewayError::InvalidKey)
}

fn request_stream(body: Body) -> ByteStream {
    Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(|e| StoreError::Io(io::Error::other(e)))),
    )
}

/// Collect a body of unknown length, refusing to hold more than `limit` bytes.
async fn read_chunked(body: Body, limit: usize, key: &ObjectKey) -> Result<Bytes, GatewayError> {
    let mut chunks = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| {
            GatewayError::backend(
                format!("Failed to read body for object {:?}", key.as_str()),
                StoreError::Io(io::Error::other(e)),
            )
        })?;
        if buf.len().saturating_add(chunk.len()) > limit {
            warn!(key = %key, limit, "chunked upload over limit");
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

// -----------------------------------------------------------------------
// PUT /object/{id}
// -----------------------------------------------------------------------

/// Store the request body, or delete the object when the body is empty.
#[tracing::instrument(skip(state, body), fields(node = tracing::field::Empty))]
pub(crate) async fn put_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Response, GatewayError> {
    let key = parse_key(&id)?;
    let (backend, node) = state
        .directory
        .locate(&key)
        .map_err(GatewayError::RoutingInconsistency)?;
    tracing::Span::current().record("node", tracing::field::display(&node));

    ensure_bucket(backend.as_ref(), &state.bucket)
        .await
        .map_err(|e| GatewayError::bucket(&state.bucket, &node, e))?;

    // Chunked uploads carry no length; buffer them (up to the limit) to learn it.
    let (length, stream) = match body.size_hint().exact() {
        Some(length) => (length, request_stream(body)),
        None => {
            let data = read_chunked(body, state.chunked_upload_limit, &key).await?;
            (data.len() as u64, stream_from_bytes(data))
        }
    };

    if length == 0 {
        backend
            .remove_object(&state.bucket, key.as_str())
            .await
            .map_err(|e| {
                GatewayError::backend(
                    format!("Failed to remove object {:?} from {:?}", key.as_str(), node.as_str()),
                    e,
                )
            })?;
        info!(key = %key, node = %node, "object deleted");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    backend
        .put_object(&state.bucket, key.as_str(), stream, length)
        .await
        .map_err(|e| {
            GatewayError::backend(
                format!("Failed to upload object {:?} to {:?}", key.as_str(), node.as_str()),
                e,
            )
        })?;
    info!(key = %key, node = %node, size = length, "object uploaded");
    Ok(StatusCode::CREATED.into_response())
}

// -----------------------------------------------------------------------
// GET /object/{id}
// -----------------------------------------------------------------------

/// Stream an object back to the client.
#[tracing::instrument(skip(state), fields(node = tracing::field::Empty))]
pub(crate) async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GatewayError> {
    let key = parse_key(&id)?;
    let (backend, node) = state
        .directory
        .locate(&key)
        .map_err(GatewayError::RoutingInconsistency)?;
    tracing::Span::current().record("node", tracing::field::display(&node));

    let exists = backend.bucket_exists(&state.bucket).await.map_err(|e| {
        GatewayError::backend(
            format!(
                "Failed to check S3 bucket {:?} existence on {:?}",
                &*state.bucket,
                node.as_str()
            ),
            e,
        )
    })?;
    if !exists {
        return Err(GatewayError::BucketNotFound {
            bucket: state.bucket.to_string(),
            node: node.to_string(),
        });
    }

    match backend.stat_object(&state.bucket, key.as_str()).await {
        Ok(_) => {}
        Err(e) if e.is_object_not_found() => {
            info!(key = %key, node = %node, "object not found");
            return Err(GatewayError::ObjectNotFound {
                key: key.to_string(),
                node: node.to_string(),
            });
        }
        Err(e) if e.is_access_denied() => return Err(GatewayError::AccessDenied(e)),
        Err(e) => return Err(GatewayError::backend("Internal server error", e)),
    }

    let mut stream = backend
        .get_object(&state.bucket, key.as_str())
        .await
        .map_err(|e| GatewayError::backend("Internal server error", e))?;

    // Pull the first chunk so an immediate failure still gets a proper status.
    let first = match stream.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(e)) => {
            return Err(GatewayError::backend(
                "Failed to write object to response",
                e,
            ));
        }
        None => None,
    };

    info!(key = %key, node = %node, "object fetched");

    let log_key = key.to_string();
    let log_node = node.to_string();
    let rest = stream.inspect(move |chunk| {
        if let Err(e) = chunk {
            error!(key = %log_key, node = %log_node, error = %e, "object stream failed");
        }
    });
    let body = futures::stream::iter(first.map(Ok)).chain(rest);

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(body),
    )
        .into_response())
}

// -----------------------------------------------------------------------
// GET /object
// -----------------------------------------------------------------------

/// List every object stored across the fleet, sorted by key.
#[tracing::instrument(skip(state))]
pub(crate) async fn list_objects(
    State(state): State<AppState>,
) -> Result<Json<ObjectListing>, GatewayError> {
    let mut objects = Vec::new();
    for node in state.directory.members() {
        let backend = state.directory.handle(&node).ok_or_else(|| {
            GatewayError::RoutingInconsistency(LocateError::UnknownNode(node.clone()))
        })?;

        let exists = backend.bucket_exists(&state.bucket).await.map_err(|e| {
            GatewayError::backend(
                format!(
                    "Failed to check S3 bucket {:?} existence on {:?}",
                    &*state.bucket,
                    node.as_str()
                ),
                e,
            )
        })?;
        if !exists {
            continue;
        }

        let listed = match backend.list_objects(&state.bucket).await {
            Ok(listed) => listed,
            Err(StoreError::NoSuchBucket { .. }) => continue,
            Err(e) => {
                return Err(GatewayError::backend(
                    format!("Failed to list objects on {:?}", node.as_str()),
                    e,
                ));
            }
        };
        objects.extend(listed.into_iter().map(|info| ListedObject {
            key: info.key,
            node: node.to_string(),
            size: info.size,
        }));
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.node.cmp(&b.node)));
    info!(count = objects.len(), "objects listed");
    Ok(Json(ObjectListing { objects }))
}

// -----------------------------------------------------------------------
// Fallback
// -----------------------------------------------------------------------

pub(crate) async fn not_found() -> GatewayError {
    GatewayError::RouteNotFound
}
