mod config;
mod engines;
mod error;
mod formats;
mod handlers;
mod jobs;
mod orchestrator;
mod router;
mod session;

use anyhow::Context;
use config::Config;
use engines::{LibreOfficeBackend, OfficeBackend};
use handlers::AppState;
use orchestrator::Orchestrator;
use session::SessionManager;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "officemill=info,tower_http=info".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // soffice is located through SOFFICE_PATH or the platform defaults
    let backend: Arc<dyn OfficeBackend> = Arc::new(LibreOfficeBackend::new());

    let session = Arc::new(SessionManager::new(
        backend,
        cfg.conversion_timeout,
        cfg.reinit_on_timeout,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&session),
        cfg.upload_dir.clone(),
        cfg.output_dir.clone(),
        cfg.output_retention,
    ));
    orchestrator
        .prepare_dirs()
        .await
        .context("failed to create staging directories")?;

    // The service still starts without an office application; conversions
    // retry the launch and answer 503 until it succeeds.
    match session.initialize().await {
        Ok(()) => info!(backend = session.backend_name(), "office session initialized"),
        Err(e) => warn!(backend = session.backend_name(), error = %e, "office session unavailable at startup"),
    }

    let state = Arc::new(AppState { orchestrator });
    let app = router::build(state, cfg.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_address))?;

    info!("officemill running on http://{}", cfg.bind_address);
    info!("Convert files: POST http://{}/convert/{{format}}", cfg.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    session.shutdown().await;
    info!("officemill stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
