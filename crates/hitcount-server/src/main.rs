//! hitcount server
//!
//! - `GET /hello/{name}` : increment and return the per-name counter
//! - Config: first argument, `HITCOUNT_CONFIG`, or `hitcount.yaml` if present
//! - JSON (ECS) or text logs on stderr, one span per request
//! - Graceful shutdown on Ctrl-C / SIGTERM

use std::process::ExitCode;

use hitcount_core::error::{HitError, Result};
use hitcount_server::{app_state::AppState, config, obs, router};

#[tokio::main]
async fn main() -> ExitCode {
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HITCOUNT_CONFIG").ok());

    // Logging comes from the config, so config errors go to stderr directly.
    let cfg = match config::load(explicit.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("hitcount: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = obs::init_logging(&cfg.log) {
        eprintln!("hitcount: {e}");
        return ExitCode::FAILURE;
    }

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "hitcount stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: config::HitcountConfig) -> Result<()> {
    let listen = cfg.server.listen_addr()?;

    let state = AppState::from_config(cfg)?;
    let app = router::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| HitError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "hitcount starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| HitError::Internal(format!("server failed: {e}")))?;

    tracing::info!("hitcount stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
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

    state.set_draining();
    tracing::info!("shutdown signal received, draining");
}
