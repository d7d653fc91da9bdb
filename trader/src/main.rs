//! Binary entry point. Loads configuration from the environment, wires the
//! state store and notifier, and runs the event orchestrator until a shutdown
//! signal arrives.

use perpbot_core::engine::EventOrchestrator;
use perpbot_core::logging::{init_logging, LogFormat};
use perpbot_core::notify::{LoggingNotifier, Notifier, ThrottledNotifier};
use perpbot_core::state_store::{InMemoryStateStore, RedisStateStore, StateStore};
use perpbot_core::Settings;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("failed to load settings: {error}");
            std::process::exit(1);
        }
    };

    init_logging(LogFormat::parse(&settings.log_format), &settings.log_level);
    info!(environment = ?settings.environment, symbols = ?settings.trading.symbols, "starting trading engine");

    let state_store: Arc<dyn StateStore> = match RedisStateStore::connect(&settings.state_store).await {
        Ok(store) => Arc::new(store),
        Err(error) => {
            warn!(%error, "failed to connect to state store, falling back to in-memory state");
            Arc::new(InMemoryStateStore::default())
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(ThrottledNotifier::new(LoggingNotifier));

    let orchestrator = match EventOrchestrator::bootstrap(settings.clone(), state_store, notifier).await {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            error!(%error, "failed to bootstrap trading engine");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let ingest_base_url = match url::Url::parse(&settings.exchange.base_url.replace("https://", "wss://")) {
        Ok(url) => url,
        Err(error) => {
            error!(%error, "invalid exchange base url");
            std::process::exit(1);
        }
    };
    let ws_base_url = ingest_base_url.clone();

    orchestrator.run(ingest_base_url, ws_base_url, shutdown_rx).await;
    info!("trading engine stopped");
}
