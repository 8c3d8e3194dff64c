use std::path::Path;
use std::sync::Arc;

use adapt_planner::adaptation::{
    AdaptationRouteState, AdaptationService, CivilClock, adaptation_routes,
};
use adapt_planner::config::AppConfig;
use adapt_planner::error::Result as PlannerResult;
use adapt_planner::program::ProgramDefinition;
use adapt_planner::store::{AdaptationStore, LibSqlBackend};
use anyhow::Context;
use tower_http::cors::CorsLayer;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install stderr logging, plus a daily rolling file when `log_dir` is set.
///
/// The returned guard must live as long as the process to flush file logs.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "adapt-planner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

/// Open the database and import the program file, if one is configured.
async fn open_store(config: &AppConfig) -> PlannerResult<Arc<dyn AdaptationStore>> {
    let store: Arc<dyn AdaptationStore> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    if let Some(path) = &config.program_path {
        tracing::info!(path = %path.display(), "Importing program");
        ProgramDefinition::load(path)
            .await?
            .import(store.as_ref())
            .await?;
    }

    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        return;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📅 Adapt Planner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   REST API: http://0.0.0.0:{}/api", config.http_port);
    eprintln!("   Calendar offset: {}\n", config.calendar_offset);

    // ── Database + program ───────────────────────────────────────────────
    let store = open_store(&config)
        .await
        .with_context(|| format!("Failed to prepare store at {}", config.db_path.display()))?;

    // ── REST server ──────────────────────────────────────────────────────
    let service = AdaptationService::new(
        Arc::clone(&store),
        Arc::new(CivilClock::new(config.calendar_offset)),
    );
    let app = adaptation_routes(AdaptationRouteState {
        service: Arc::new(service),
    })
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "Adaptation REST server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
