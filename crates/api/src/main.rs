use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dealflow_api::config::{self, LogFormat, ServerConfig};
use dealflow_api::router::build_app_router;
use dealflow_api::state::AppState;
use dealflow_events::{EmailConfig, EmailDelivery, EventBus, EventPersistence};
use dealflow_workflow::{
    DisabledMailer, HttpScorer, PartnerMailer, PgDealStore, ScoringConfig, ScoringQueue,
    ScoringWorker, SmtpPartnerMailer, WorkflowService,
};

const DEFAULT_LOG_FILTER: &str = "dealflow_api=debug,dealflow_workflow=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    match config::log_format_from_env()? {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = dealflow_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    dealflow_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    dealflow_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));
    tracing::info!("Event persistence started");

    // --- Partner email ---
    let mailer: Arc<dyn PartnerMailer> = match EmailConfig::from_env() {
        Some(email_config) => {
            tracing::info!(smtp_host = %email_config.smtp_host, "Partner email enabled");
            Arc::new(SmtpPartnerMailer::new(EmailDelivery::new(email_config)))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, partner release emails are disabled");
            Arc::new(DisabledMailer)
        }
    };

    // --- Workflow service ---
    let store = Arc::new(PgDealStore::new(pool.clone()));
    let mut workflow = WorkflowService::new(store.clone(), Arc::clone(&event_bus), mailer);

    // --- Scoring worker ---
    workflow
        .recover_interrupted_scoring()
        .await
        .context("Failed to reset interrupted scoring jobs")?;

    let scoring_cancel = CancellationToken::new();
    let scoring_handle = match ScoringConfig::from_env() {
        Some(scoring_config) => {
            let scorer = HttpScorer::new(&scoring_config).context("Failed to build scoring client")?;
            let (queue, jobs) = ScoringQueue::channel(scoring_config.queue_capacity);
            workflow = workflow.with_scoring_queue(queue);
            let worker = ScoringWorker::new(store, Arc::clone(&event_bus), Arc::new(scorer));
            tracing::info!(
                url = %scoring_config.url,
                capacity = scoring_config.queue_capacity,
                "Scoring worker started",
            );
            Some(tokio::spawn(worker.run(jobs, scoring_cancel.clone())))
        }
        None => {
            tracing::warn!("SCORING_URL not set, scoring requests will be rejected");
            None
        }
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        workflow,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    scoring_cancel.cancel();
    if let Some(handle) = scoring_handle {
        let wait = Duration::from_secs(config.shutdown_timeout_secs);
        if tokio::time::timeout(wait, handle).await.is_err() {
            tracing::warn!("Scoring worker did not stop in time");
        } else {
            tracing::info!("Scoring worker stopped");
        }
    }

    // Persistence exits once every bus handle is gone.
    drop(event_bus);
    let wait = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(wait, persistence_handle).await.is_err() {
        tracing::warn!("Event persistence did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
