//! HTTP API for zstored
//!
//! Every request under the API prefix goes through [`storage_handler`]:
//!
//! 1. derive the dataset name from the client address and path
//! 2. reject names that are neither `pool/bucket` nor `pool/bucket/leaf`
//! 3. pick a [`StorageOp`] from the method and the name's depth
//! 4. run it against the [`Pool`] and map the outcome to a status code
//!
//! Clients never see backend error text. Error responses carry no body,
//! except the list of valid sizes on a 400.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::storage::{slugs, Pool, Volume};
use crate::zstored::naming::{derive_name, local_name, Depth, VolumeName};

/// Body of a create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRequest {
    pub size: String,
}

/// JSON representation of a volume. `name` is pool-local: `bucket/leaf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub name: String,
    pub size: u64,
}

impl VolumeResponse {
    fn from_volume(volume: &dyn Volume, pool: &str) -> Self {
        Self {
            name: local_name(volume.name(), pool).to_string(),
            size: volume.size(),
        }
    }
}

/// Body of list and fetch responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageResponse {
    pub volumes: Vec<VolumeResponse>,
}

/// Body of a 400 on create: every size a client may ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidSizeResponse {
    pub sizes: Vec<String>,
}

/// Shared state for storage handlers.
#[derive(Clone)]
pub struct StorageState {
    pub pool: Arc<dyn Pool>,
    pub api_prefix: Arc<str>,
}

impl StorageState {
    pub fn new(pool: Arc<dyn Pool>, api_prefix: &str) -> Self {
        Self {
            pool,
            api_prefix: Arc::from(api_prefix.trim_end_matches('/')),
        }
    }
}

/// Operation selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    List,
    Fetch,
    Create,
    Destroy,
}

impl StorageOp {
    /// Map a method and name depth to an operation.
    ///
    /// `Depth::Other` is 404 for every method; an unknown method, or a known
    /// one without an operation at this depth, is 405.
    pub fn select(method: &Method, depth: Depth) -> std::result::Result<Self, StatusCode> {
        if depth == Depth::Other {
            return Err(StatusCode::NOT_FOUND);
        }

        let op = match (method.as_str(), depth) {
            ("GET", Depth::Bucket) => StorageOp::List,
            ("GET", Depth::Volume) => StorageOp::Fetch,
            ("POST" | "PUT", Depth::Volume) => StorageOp::Create,
            ("DELETE", Depth::Volume) => StorageOp::Destroy,
            _ => return Err(StatusCode::METHOD_NOT_ALLOWED),
        };
        Ok(op)
    }
}

/// Build the storage API router for `state.api_prefix`.
pub fn create_router(state: StorageState) -> Router {
    let base = state.api_prefix.to_string();

    let mut router = Router::new();
    if !base.is_empty() {
        router = router.route(&base, any(storage_handler));
    }
    router
        .route(&format!("{}/", base), any(storage_handler))
        .route(&format!("{}/*path", base), any(storage_handler))
        .with_state(state)
}

/// Entry point for every storage request.
pub async fn storage_handler(
    State(state): State<StorageState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let client_addr = peer
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let name = match derive_name(
        state.pool.name(),
        &client_addr,
        uri.path(),
        &state.api_prefix,
    ) {
        Ok(name) => name,
        Err(e) => return error_response(None, uri.path(), &e),
    };

    let op = match StorageOp::select(&method, name.depth()) {
        Ok(op) => op,
        Err(status) => {
            tracing::debug!(volume = %name, method = %method, status = %status.as_u16(), "request rejected");
            return status.into_response();
        }
    };

    match op {
        StorageOp::List => list_volumes(&state, &name).await,
        StorageOp::Fetch => fetch_volume(&state, &name).await,
        StorageOp::Create => create_volume(&state, &name, &body).await,
        StorageOp::Destroy => destroy_volume(&state, &name).await,
    }
}

/// Turn an error into its status code.
///
/// Outcomes the client can act on are logged at debug. Server faults are
/// logged once at error and hidden behind a bare 500.
fn error_response(op: Option<StorageOp>, target: &str, err: &Error) -> Response {
    let status = err.to_http_status();
    if err.is_domain() {
        tracing::debug!(op = ?op, volume = %target, status = %status.as_u16(), error = %err, "storage request refused");
    } else {
        tracing::error!(op = ?op, volume = %target, error = %err, "storage operation failed");
    }
    status.into_response()
}

async fn list_volumes(state: &StorageState, bucket: &VolumeName) -> Response {
    match state.pool.list_volumes(bucket.as_str()).await {
        Ok(volumes) => {
            let volumes = volumes
                .iter()
                .map(|v| VolumeResponse::from_volume(v.as_ref(), state.pool.name()))
                .collect();
            (StatusCode::OK, Json(StorageResponse { volumes })).into_response()
        }
        Err(e) => error_response(Some(StorageOp::List), bucket.as_str(), &e),
    }
}

async fn fetch_volume(state: &StorageState, name: &VolumeName) -> Response {
    match state.pool.volume(name.as_str()).await {
        Ok(volume) => {
            let body = StorageResponse {
                volumes: vec![VolumeResponse::from_volume(volume.as_ref(), state.pool.name())],
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(Some(StorageOp::Fetch), name.as_str(), &e),
    }
}

/// Parse a create body into a size in bytes.
///
/// An empty or undecodable body counts as an invalid size, as does any slug
/// outside the catalog.
pub fn requested_size(body: &[u8]) -> Result<u64> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(Error::InvalidSize);
    }

    let request: StorageRequest = serde_json::from_slice(body).map_err(|_| Error::InvalidSize)?;
    slugs::resolve(&request.size).ok_or(Error::InvalidSize)
}

async fn create_volume(state: &StorageState, name: &VolumeName, body: &[u8]) -> Response {
    let op = Some(StorageOp::Create);

    match state.pool.volume(name.as_str()).await {
        Ok(_) => return error_response(op, name.as_str(), &Error::AlreadyExists),
        Err(Error::NotExists) => {}
        Err(e) => return error_response(op, name.as_str(), &e),
    }

    let size = match requested_size(body) {
        Ok(size) => size,
        Err(_) => {
            tracing::debug!(op = ?op, volume = %name, "invalid size slug");
            let hint = InvalidSizeResponse {
                sizes: slugs::all_slugs_ordered()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            };
            return (StatusCode::BAD_REQUEST, Json(hint)).into_response();
        }
    };

    match state.pool.create_volume(name.as_str(), size).await {
        Ok(volume) => {
            tracing::info!(volume = %name, size, "volume created");
            let body = VolumeResponse::from_volume(volume.as_ref(), state.pool.name());
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => error_response(op, name.as_str(), &e),
    }
}

async fn destroy_volume(state: &StorageState, name: &VolumeName) -> Response {
    let op = Some(StorageOp::Destroy);

    let volume = match state.pool.volume(name.as_str()).await {
        Ok(volume) => volume,
        Err(e) => return error_response(op, name.as_str(), &e),
    };

    // No retry: after a failed recursive destroy the volume may still exist.
    match volume.destroy().await {
        Ok(()) => {
            tracing::info!(volume = %name, "volume destroyed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(op, name.as_str(), &e),
    }
}
