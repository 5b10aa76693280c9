//! axum router for the session API.
//!
//! - `POST /api/events`: inbound participant and host actions
//! - `GET /api/state`: current snapshot
//! - `GET /api/leaderboard`: ranked standings
//! - `GET /api/stream`: Server-Sent Events feed of outbound messages
//! - `GET /health`: liveness

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ADMIN_TOKEN_HEADER, DEFAULT_MAX_BODY_SIZE, Result};
use crate::error::TransportError;
use crate::runtime::{InboundEvent, Outbound, SessionHandle};
use crate::session::UserId;

/// Configuration for the HTTP listener.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to, e.g. `"0.0.0.0:5000"`.
    pub bind_addr: String,
    /// Shared host credential; host actions are open when `None`.
    pub admin_token: Option<String>,
    /// Maximum allowed request body size in bytes.
    pub max_body_size: usize,
}

impl HttpConfig {
    /// Config with the default body limit.
    #[must_use]
    pub fn new(bind_addr: impl Into<String>, admin_token: Option<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            admin_token,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// State shared by the handlers.
struct AppState {
    session: SessionHandle,
    admin_token: Option<String>,
    /// Open SSE streams per participant.
    streams: Arc<DashMap<UserId, usize>>,
}

/// Binds the listener and serves the router until `cancel` fires.
///
/// Returns the bound address (useful with port 0) and the server task.
///
/// # Errors
///
/// Returns [`TransportError::BindFailed`] if the listener cannot bind.
pub async fn bind(
    config: HttpConfig,
    session: SessionHandle,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| TransportError::BindFailed(format!("{}: {e}", config.bind_addr)))?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| TransportError::BindFailed(format!("local_addr failed: {e}")))?;

    let router = build_router(session, &config);
    let handle = tokio::spawn(async move {
        info!(%bound_addr, "HTTP server started");
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            warn!(error = %e, "HTTP server error");
        }
        debug!("HTTP server shut down");
    });
    Ok((bound_addr, handle))
}

/// Builds the router over a running session.
pub fn build_router(session: SessionHandle, config: &HttpConfig) -> Router {
    let state = Arc::new(AppState {
        session,
        admin_token: config.admin_token.clone(),
        streams: Arc::new(DashMap::new()),
    });
    Router::new()
        .route("/api/events", post(handle_event))
        .route("/api/state", get(handle_state))
        .route("/api/leaderboard", get(handle_leaderboard))
        .route("/api/stream", get(handle_stream))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "session is no longer running").into_response()
}

async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid event: {e}")).into_response(),
    };

    if event.is_host_action() && !authorized(state.admin_token.as_deref(), &headers) {
        debug!(action = event.action(), "host action without valid token");
        return (StatusCode::UNAUTHORIZED, "admin token required").into_response();
    }

    match state.session.dispatch(event).await {
        Ok(reply) => Json(reply).into_response(),
        Err(_) => unavailable(),
    }
}

fn authorized(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| given == expected)
}

async fn handle_state(State(state): State<Arc<AppState>>) -> Response {
    match state.session.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(_) => unavailable(),
    }
}

async fn handle_leaderboard(State(state): State<Arc<AppState>>) -> Response {
    match state.session.leaderboard().await {
        Ok(standings) => Json(standings).into_response(),
        Err(_) => unavailable(),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    if state.session.is_running() {
        Json(serde_json::json!({ "status": "ok" })).into_response()
    } else {
        unavailable()
    }
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    user_id: Option<String>,
}

/// `GET /api/stream`
///
/// Opens with the current snapshot, then relays every outbound message.
/// Lagging subscribers skip missed frames.
async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Response {
    // Subscribe before reading the snapshot so no update falls in between.
    let rx = state.session.subscribe();
    let Ok(initial) = state.session.snapshot().await else {
        return unavailable();
    };

    let guard = match query.user_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => {
            let user_id = UserId::new(id);
            let guard = StreamGuard::open(&state, user_id.clone());
            if guard.first && state.session.attach(user_id).await.is_err() {
                return unavailable();
            }
            Some(guard)
        }
        None => None,
    };

    let head = tokio_stream::once(Outbound::StateUpdate(Box::new(initial)));
    let updates = BroadcastStream::new(rx).filter_map(|msg| msg.ok());
    let stream = head.chain(updates).filter_map(move |msg| {
        // The guard lives as long as the stream.
        let _ = &guard;
        to_sse(&msg)
    });
    sse_response(stream)
}

fn sse_response(
    stream: impl Stream<Item = std::result::Result<SseEvent, Infallible>> + Send + 'static,
) -> Response {
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn to_sse(msg: &Outbound) -> Option<std::result::Result<SseEvent, Infallible>> {
    let data = serde_json::to_string(msg).ok()?;
    Some(Ok(SseEvent::default().event(msg.name()).data(data)))
}

// ============================================================================
// Stream tracking
// ============================================================================

/// Counts one open stream for a participant.
///
/// The participant is attached when their first stream opens and detached
/// when the guard for their last stream drops, on every exit path.
struct StreamGuard {
    streams: Arc<DashMap<UserId, usize>>,
    session: SessionHandle,
    user_id: UserId,
    first: bool,
}

impl StreamGuard {
    fn open(state: &AppState, user_id: UserId) -> Self {
        let first = {
            let mut count = state.streams.entry(user_id.clone()).or_insert(0);
            *count += 1;
            *count == 1
        };
        Self {
            streams: Arc::clone(&state.streams),
            session: state.session.clone(),
            user_id,
            first,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let last = {
            let Some(mut count) = self.streams.get_mut(&self.user_id) else {
                return;
            };
            *count = count.saturating_sub(1);
            *count == 0
        };
        if !last {
            return;
        }
        self.streams.remove_if(&self.user_id, |_, count| *count == 0);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = self.session.clone();
        let user_id = self.user_id.clone();
        runtime.spawn(async move {
            debug!(user_id = %user_id, "last stream closed");
            let _ = session.detach(user_id).await;
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
