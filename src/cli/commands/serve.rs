//! `pitchroom serve`: run the session host until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crate::cli::args::ServeArgs;
use crate::cli::shutdown::Shutdown;
use crate::config::{ConfigLoader, LoadResult, PitchroomConfig};
use crate::error::PitchroomError;
use crate::observability::{Event, EventEmitter};
use crate::runtime::spawn_session;
use crate::session::{SessionEngine, TokioClock};
use crate::transport::{self, HttpConfig, advertised_url};

/// How long shutdown waits for open connections to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Starts the session actor and HTTP listener, then blocks until
/// `shutdown` fires.
///
/// # Errors
///
/// Returns a configuration error if the file or the overridden settings
/// are invalid, an I/O error if the events file or metrics listener cannot
/// be opened, or a transport error if the listener cannot bind.
pub async fn run(args: &ServeArgs, shutdown: Shutdown) -> Result<(), PitchroomError> {
    let loaded = load_config(args)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    let config = loaded.config;

    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let emitter = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let engine = SessionEngine::new(
        config.session_settings(),
        config.context_pool(),
        Arc::new(TokioClock),
    );
    let (session, actor_task) = spawn_session(
        engine,
        config.runtime_options(),
        Arc::clone(&emitter),
        shutdown.token().child_token(),
    );

    let http_config = HttpConfig::new(config.server.bind.clone(), config.server.admin_token.clone());
    let (bound, server_task) = transport::bind(http_config, session, shutdown.token().clone()).await?;

    let base_url = advertised_url(config.server.public_url.as_deref(), bound);
    println!("{}", banner(&base_url, bound, config.server.admin_token.is_some()));

    emitter.emit(Event::ServerStarted {
        timestamp: Utc::now(),
        bind: bound.to_string(),
        public_url: base_url,
    });

    let reason = shutdown.wait().await;
    tracing::info!(?reason, "shutting down");

    // Open event streams never end on their own; stop waiting for them.
    match tokio::time::timeout(SHUTDOWN_GRACE, server_task).await {
        Ok(Err(e)) => tracing::warn!(error = %e, "HTTP server task failed"),
        Err(_) => tracing::debug!("event streams still open at shutdown; closing"),
        Ok(Ok(())) => {}
    }
    if let Err(e) = actor_task.await {
        tracing::warn!(error = %e, "session actor task failed");
    }

    emitter.emit(Event::ServerStopped {
        timestamp: Utc::now(),
        reason,
    });
    Ok(())
}

/// Loads the file (or defaults), applies CLI overrides and validates the
/// result.
fn load_config(args: &ServeArgs) -> Result<LoadResult, PitchroomError> {
    let loader = ConfigLoader::default();
    let (loaded, origin) = match &args.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading configuration");
            (loader.load(path)?, path.display().to_string())
        }
        None => (loader.load_default()?, "<defaults>".to_string()),
    };

    match apply_overrides(&loaded.config, args) {
        // Overrides can both introduce and clear issues; the fresh pass
        // replaces the file's warnings.
        Some(config) => Ok(loader.revalidate(config, &origin)?),
        None => Ok(loaded),
    }
}

/// Returns the config with CLI overrides applied, or `None` when no
/// override was given.
#[must_use]
pub fn apply_overrides(base: &PitchroomConfig, args: &ServeArgs) -> Option<PitchroomConfig> {
    if args.bind.is_none()
        && args.admin_token.is_none()
        && args.public_url.is_none()
        && args.prep_duration.is_none()
    {
        return None;
    }
    let mut config = base.clone();
    if let Some(bind) = &args.bind {
        config.server.bind.clone_from(bind);
    }
    if let Some(token) = &args.admin_token {
        config.server.admin_token = Some(token.clone());
    }
    if let Some(url) = &args.public_url {
        config.server.public_url = Some(url.clone());
    }
    if let Some(prep) = args.prep_duration {
        config.session.prep_duration = prep;
    }
    Some(config)
}

/// Startup banner listing the entry points.
#[must_use]
pub fn banner(base_url: &str, bound: SocketAddr, token_required: bool) -> String {
    let access = if token_required {
        "host actions require the admin token"
    } else {
        "host actions are open (no admin token)"
    };
    format!(
        "pitchroom listening on {bound}\n  \
         participants: {base_url}/api/stream?user_id=<id>\n  \
         host panel:   {base_url}/api/events ({access})\n  \
         state:        {base_url}/api/state\n  \
         leaderboard:  {base_url}/api/leaderboard"
    )
}
