use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use heartwatch::api::WebhookMailer;
use heartwatch::db::{self, ReadingStore, Registry};
use heartwatch::router::{MonitorState, monitor_router};
use heartwatch::service::danger::DangerPolicy;
use heartwatch::service::mailer::{LogMailer, Mailer};
use heartwatch::service::model_loader::load_registry;
use heartwatch::service::notifier::NotificationDispatcher;
use heartwatch::service::pipeline::IngestionPipeline;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &heartwatch::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        listen_addr = %cfg.listen_addr,
        mail_relay = %cfg.mail.relay_url.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
    );
    if cfg.operator_key == "change-me" {
        warn!("operator key is the built-in default; set HEARTWATCH_OPERATOR_KEY");
    }

    let pool = db::open(&cfg.database_url).await?;
    let readings = ReadingStore::new(pool.clone());
    let registry = Registry::new(pool);

    let classifiers = load_registry(&cfg.models)?;
    info!("classifier models loaded");

    let mailer: Arc<dyn Mailer> = match cfg.mail.relay_url.clone() {
        Some(url) => Arc::new(WebhookMailer::new(url, &cfg.mail)?),
        None => {
            warn!("no mail relay configured; alerts will only be logged");
            Arc::new(LogMailer)
        }
    };
    let dispatcher =
        NotificationDispatcher::new(registry.clone(), mailer, cfg.mail.fanout_concurrency);

    let pipeline = IngestionPipeline::new(
        classifiers,
        DangerPolicy::new(cfg.thresholds),
        readings.clone(),
        registry.clone(),
        dispatcher,
    );

    let operator_key: Arc<str> = Arc::from(cfg.operator_key.as_str());
    let state = MonitorState::new(pipeline, readings, registry, operator_key);
    let app = monitor_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
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
                warn!(error = %e, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}
