//! HTTP handlers for the Coedit server.
//!
//! Credentials are checked on the upgrade request itself; a connection that
//! fails authentication gets a 401 and never becomes a WebSocket.

use crate::config::{Config, CorsConfig};
use crate::metrics;
use crate::session;
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use coedit_core::{AuthError, HttpProfileLookup, IdentityGate, SessionRegistry};
use coedit_protocol::{codec::MAX_FRAME_SIZE, Encoding, Version, PROTOCOL_VERSION};
use coedit_transport::WebSocketConnection;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Who is viewing which document.
    pub registry: Arc<SessionRegistry>,
    /// Credential verification and name resolution.
    pub gate: IdentityGate,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    ///
    /// # Errors
    ///
    /// Returns an error if no JWT secret is configured.
    pub fn new(config: Config) -> Result<Self> {
        let secret = config
            .auth
            .secret()
            .context("No JWT secret configured")?;

        let mut gate =
            IdentityGate::new(secret).with_profile_timeout(config.auth.profile_timeout());
        if let Some(url) = &config.auth.profile_url {
            info!(url = %url, "Resolving display names from profile service");
            gate = gate.with_profiles(Arc::new(HttpProfileLookup::new(url.clone())));
        }

        Ok(Self {
            registry: Arc::new(SessionRegistry::new()),
            gate,
            config,
        })
    }
}

/// Query parameters accepted on the WebSocket endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Credential for clients that cannot set headers.
    pub token: Option<String>,
    /// Wire encoding for server events.
    #[serde(default)]
    pub encoding: Encoding,
    /// Protocol version the client speaks.
    pub protocol: Option<String>,
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let ws_path = config.transport.websocket_path.clone();

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let state = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Coedit server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}{}", addr, ws_path);

    serve(listener, state).await
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.registry.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "participants": stats.participant_count,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credential = bearer_token(&headers).or(params.token.as_deref());

    let identity = match state.gate.resolve(credential).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "Rejected connection");
            metrics::record_auth_rejection(rejection_reason(&e));
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    if let Some(requested) = &params.protocol {
        match requested.parse::<Version>() {
            Ok(version) if version.is_compatible_with(&PROTOCOL_VERSION) => {}
            Ok(version) => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("Unsupported protocol version {version}, server speaks {PROTOCOL_VERSION}"),
                )
                    .into_response();
            }
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }

    let encoding = params.encoding;
    let max_message_size = state.config.transport.max_message_size;
    let registry = Arc::clone(&state.registry);

    // Messages over the configured limit are answered with an error by the
    // transport; the socket itself only gives up past the codec maximum.
    ws.max_message_size(MAX_FRAME_SIZE.max(max_message_size))
        .on_upgrade(move |socket| {
            let mut connection = WebSocketConnection::new(socket, encoding)
                .with_max_message_size(max_message_size);
            if let Some(ConnectInfo(addr)) = connect_info {
                connection = connection.with_remote_addr(addr);
            }
            session::run(Box::new(connection), identity, registry)
        })
}

/// Extract the token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn rejection_reason(error: &AuthError) -> &'static str {
    match error {
        AuthError::MissingCredential => "missing",
        AuthError::InvalidCredential(_) => "invalid",
        AuthError::MissingSubject => "no_subject",
    }
}
