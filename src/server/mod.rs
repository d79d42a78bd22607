//! HTTP surface of the bridge
//!
//! `GET /` pulls the local clipboard, `POST /` pushes into it. Every request
//! passes through the same middleware stack: client name, request id,
//! access log, API version check.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use percent_encoding::percent_decode;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};

use crate::clipboard::ContentKind;
use crate::config::ServerConfig;
use crate::sync::{FileBody, PullResponse, SyncError, SyncHandler, TextBody};

/// URL-path-escaped display name of the client
pub const CLIENT_NAME_HEADER: &str = "x-client-name";
/// Protocol version announced by the client
pub const API_VERSION_HEADER: &str = "x-api-version";
/// Declared kind of a pushed payload
pub const CONTENT_KIND_HEADER: &str = "x-content-type";

/// Client name used when none is supplied
pub const ANONYMOUS_CLIENT: &str = "匿名设备";

/// API errors, all reported as `400 {"error": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong `X-API-Version`
    #[error("接口版本不匹配，请升级您的捷径")]
    VersionMismatch,

    /// Missing or unknown `X-Content-Type`
    #[error("Unknown content type: {0:?}")]
    UnknownKind(String),

    /// Body is not the expected JSON
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Pull or push failed
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Display name of the requesting client
#[derive(Debug, Clone)]
pub struct ClientName(pub String);

/// Per-request identifier used in logs
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<SyncHandler>,
    pub api_version: Arc<str>,
}

/// Build the HTTP router
pub fn build_router(handler: Arc<SyncHandler>, config: &ServerConfig) -> Router {
    let state = AppState {
        handler,
        api_version: Arc::from(config.api_version.as_str()),
    };

    // The last layer added runs first
    Router::new()
        .route("/", get(pull_handler).post(push_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            check_api_version,
        ))
        .layer(middleware::from_fn(access_log))
        .layer(middleware::from_fn(assign_request_id))
        .layer(middleware::from_fn(extract_client_name))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> crate::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Decode `X-Client-Name`, falling back to [`ANONYMOUS_CLIENT`].
///
/// The raw header bytes are unescaped, so unescaped UTF-8 names pass
/// through. A malformed `%` escape counts as a decoding failure.
pub fn decode_client_name(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_NAME_HEADER)
        .map(|v| v.as_bytes())
        .filter(|raw| has_valid_escapes(raw))
        .and_then(|raw| percent_decode(raw).decode_utf8().ok())
        .map(|name| name.into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

/// Every `%` is followed by two hex digits
fn has_valid_escapes(raw: &[u8]) -> bool {
    let mut rest = raw;
    while let Some(pos) = rest.iter().position(|&b| b == b'%') {
        match rest.get(pos + 1..pos + 3) {
            Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => rest = &rest[pos + 3..],
            _ => return false,
        }
    }
    true
}

async fn extract_client_name(mut req: Request, next: Next) -> Response {
    let name = decode_client_name(req.headers());
    req.extensions_mut().insert(ClientName(name));
    next.run(req).await
}

async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let id = rand::random::<u32>().to_string();
    req.extensions_mut().insert(RequestId(id));
    next.run(req).await
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();
    let client_name = req
        .extensions()
        .get::<ClientName>()
        .map(|c| c.0.clone())
        .unwrap_or_default();
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let span = info_span!("request", request_id = %request_id);
    let start = Instant::now();
    let response = next.run(req).instrument(span.clone()).await;
    let duration = start.elapsed();
    let status = response.status();

    span.in_scope(|| {
        let status_code = status.as_u16();
        if status.is_server_error() {
            error!(%method, status = status_code, %client_ip, %path, ?duration, %client_name, "request");
        } else if status.is_client_error() {
            warn!(%method, status = status_code, %client_ip, %path, ?duration, %client_name, "request");
        } else {
            info!(%method, status = status_code, %client_ip, %path, ?duration, %client_name, "request");
        }
    });

    response
}

async fn check_api_version(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let version = req
        .headers()
        .get(API_VERSION_HEADER)
        .and_then(|v| v.to_str().ok());

    if version == Some(&*state.api_version) {
        next.run(req).await
    } else {
        ApiError::VersionMismatch.into_response()
    }
}

async fn pull_handler(
    State(state): State<AppState>,
    Extension(ClientName(client)): Extension<ClientName>,
) -> Result<Json<PullResponse>, ApiError> {
    let snapshot = state.handler.pull(&client).await?;
    Ok(Json(snapshot.into()))
}

async fn push_handler(
    State(state): State<AppState>,
    Extension(ClientName(client)): Extension<ClientName>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let declared = headers
        .get(CONTENT_KIND_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let kind: ContentKind = declared.parse().map_err(|_| {
        warn!("Unknown content type {:?}", declared);
        ApiError::UnknownKind(declared.to_string())
    })?;

    if kind.is_staged() {
        let body: FileBody = serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to bind file body: {}", e);
            e
        })?;
        state.handler.push_files(&client, kind, body).await?;
    } else {
        let body: TextBody = serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to bind text body: {}", e);
            e
        })?;
        state.handler.push_text(&client, body).await?;
    }

    Ok(StatusCode::OK)
}

async fn not_found_handler() -> StatusCode {
    info!("404 not found");
    StatusCode::NOT_FOUND
}
