//! Shared integration-test harness: in-process sessions, HTTP request
//! builders and a helper for running the `pitchroom` binary.

#![allow(dead_code)]

use std::io::Write;
use std::process::Output;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;

use pitchroom::observability::EventEmitter;
use pitchroom::runtime::{InboundEvent, RuntimeOptions, SessionHandle, spawn_session};
use pitchroom::session::{
    ContextPool, ManualClock, SessionEngine, SessionSettings, TokioClock, UserId,
};
use pitchroom::transport::ADMIN_TOKEN_HEADER;

/// Seed used wherever a test needs reproducible shuffles.
pub const SEED: u64 = 7;

/// An engine on a manual clock with `users` participants already joined
/// as `u0`, `u1`, ...
pub fn engine_with_users(users: usize) -> (SessionEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let mut engine = SessionEngine::with_rng(
        SessionSettings::default(),
        ContextPool::default(),
        clock.clone(),
        StdRng::seed_from_u64(SEED),
    );
    for i in 0..users {
        engine
            .join(&UserId::new(format!("u{i}")), &format!("User {i}"))
            .expect("join");
    }
    (engine, clock)
}

/// A running session actor on tokio's clock.
pub struct TestSession {
    pub handle: SessionHandle,
    pub cancel: CancellationToken,
}

impl TestSession {
    pub fn start(options: RuntimeOptions) -> Self {
        Self::start_with(SessionSettings::default(), options)
    }

    pub fn start_with(settings: SessionSettings, options: RuntimeOptions) -> Self {
        Self::start_emitting(settings, options, EventEmitter::noop())
    }

    /// Starts a session whose event stream is captured in memory.
    pub fn start_recording(
        settings: SessionSettings,
        options: RuntimeOptions,
    ) -> (Self, CapturedEvents) {
        let captured = CapturedEvents::default();
        let emitter = EventEmitter::new(Box::new(captured.clone()));
        (Self::start_emitting(settings, options, emitter), captured)
    }

    fn start_emitting(
        settings: SessionSettings,
        options: RuntimeOptions,
        emitter: EventEmitter,
    ) -> Self {
        let engine = SessionEngine::with_rng(
            settings,
            ContextPool::default(),
            Arc::new(TokioClock),
            StdRng::seed_from_u64(SEED),
        );
        let cancel = CancellationToken::new();
        let (handle, _task) = spawn_session(
            engine,
            options,
            Arc::new(emitter),
            cancel.clone(),
        );
        Self { handle, cancel }
    }

    /// Dispatches an event and asserts it was accepted.
    pub async fn accept(&self, event: InboundEvent) -> pitchroom::runtime::EventReply {
        let reply = self.handle.dispatch(event).await.expect("session running");
        assert!(reply.accepted, "rejected: {:?}", reply.message);
        reply
    }

    /// Joins `u0..u{n}`.
    pub async fn join_users(&self, n: usize) {
        for i in 0..n {
            self.accept(InboundEvent::Join {
                user_id: UserId::new(format!("u{i}")),
                name: format!("User {i}"),
            })
            .await;
        }
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// In-memory JSONL sink for the session event stream.
#[derive(Clone, Default)]
pub struct CapturedEvents(Arc<Mutex<Vec<u8>>>);

impl CapturedEvents {
    /// Every captured event, parsed.
    pub fn events(&self) -> Vec<serde_json::Value> {
        let buf = self.0.lock().expect("capture lock");
        String::from_utf8_lossy(&buf)
            .lines()
            .map(|line| serde_json::from_str(line).expect("jsonl line"))
            .collect()
    }

    /// Number of captured events of the given `type`.
    pub fn count(&self, kind: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e["type"] == kind)
            .count()
    }
}

impl Write for CapturedEvents {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Builds `POST /api/events` with an optional admin token.
pub fn post_event(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/events")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(ADMIN_TOKEN_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Builds a bodiless `GET`.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Collects a response body as JSON.
pub async fn body_json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Runs the compiled binary to completion.
pub fn run_cli(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_pitchroom"))
        .args(args)
        .env_remove("PITCHROOM_CONFIG")
        .env_remove("PITCHROOM_LOG_LEVEL")
        .output()
        .expect("failed to run pitchroom")
}
