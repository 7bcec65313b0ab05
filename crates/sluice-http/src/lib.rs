//! HTTP object gateway for Sluice.
//!
//! Exposes a tiny object API in front of the storage fleet:
//!
//! - `PUT /object/{id}` stores the body on the node owning `id`, or deletes
//!   the object when the body is empty.
//! - `GET /object/{id}` streams the object back.
//! - `GET /object` lists every object across the fleet.
//!
//! Anything else answers `404 - Not Found`.
//!
//! Uploads with a `Content-Length` stream straight through to the node.
//! Chunked uploads are buffered up to [`GatewayConfig::chunked_upload_limit`]
//! bytes to learn their length; larger ones are refused with 413.

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use sluice_cluster::Directory;

pub use error::GatewayError;
pub use handlers::{ListedObject, ObjectListing};

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Routing directory built at startup.
    pub directory: Arc<Directory>,
    /// Bucket every object is stored in on its node.
    pub bucket: String,
    /// Most bytes buffered for an upload sent without `Content-Length`.
    pub chunked_upload_limit: usize,
}

/// Default cap on a buffered chunked upload (64 MiB).
pub const DEFAULT_CHUNKED_UPLOAD_LIMIT: usize = 64 * 1024 * 1024;

/// Shared state passed to all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub directory: Arc<Directory>,
    pub bucket: Arc<str>,
    pub chunked_upload_limit: usize,
}

/// The object gateway server.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    /// Create a new gateway over a built directory.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState {
            directory: config.directory,
            bucket: Arc::from(config.bucket),
            chunked_upload_limit: config.chunked_upload_limit,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(
                "/object/{id}",
                get(handlers::get_object).put(handlers::put_object),
            )
            .route("/object", get(handlers::list_objects))
            .fallback(handlers::not_found)
            // Sized uploads stream to the node; chunked ones are capped in the handler.
            .layer(DefaultBodyLimit::disable())
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the gateway on `addr` until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish once shutdown starts.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "gateway listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
