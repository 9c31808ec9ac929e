//! # Joke of the Week server
//!
//! Collects jokes per community through an HTTP command surface, posts a
//! weekly poll on a cron schedule, and announces the ranking once the voting
//! window closes. Communities and pending jokes survive restarts through a
//! JSON data file.

use anyhow::{Context, Result};
use static_init::dynamic;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use lib_jotw::configs::PollSettings;
use lib_jotw::connections::{JsonFileStore, LoopbackTransport};
use lib_jotw::core::{CommunityRegistry, PollCycleController, PollScheduler};

mod jotw_logic;
use jotw_logic::{config, logger, routes, state};

#[dynamic]
static DOTENV_INIT: () = {
    dotenvy::dotenv().ok();
};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_warnings) = config::load_config();
    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    let _log_guard = logger::setup_logging(&log_dir, &log_level)?;
    for warning in &config_warnings {
        warn!("{}", warning);
    }

    let settings: PollSettings = config.poll_settings().context("Invalid poll settings")?;
    info!("Poll settings: {}", settings);

    let data_file = config.data_file.clone().unwrap_or_else(|| PathBuf::from("guilds.json"));
    let store = Arc::new(JsonFileStore::new(data_file));
    let data_path = store.path().display().to_string();
    let registry = match CommunityRegistry::load(settings.symbols.clone(), store.clone()) {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Could not load {}: {}. Starting with no communities.", data_path, e);
            CommunityRegistry::from_snapshot(settings.symbols.clone(), HashMap::new()).with_store(store)
        }
    };
    info!("Loaded {} communities from {}", registry.community_ids().len(), data_path);

    let bot_account = config.bot_account_id.clone().unwrap_or_else(|| "jotw-bot".to_string());
    let transport = Arc::new(LoopbackTransport::new(bot_account));
    let controller = Arc::new(
        PollCycleController::new(Arc::new(registry), transport.clone(), settings.window)
            .with_identity(transport.clone()),
    );

    let mut scheduler = PollScheduler::start(controller.clone(), &settings.cron, settings.timezone).await?;
    let timezone = scheduler.timezone();
    match scheduler.next_fire().await {
        Ok(Some(next)) => info!("Next poll cycle at {}", next.with_timezone(&timezone)),
        Ok(None) => warn!("Schedule '{}' never fires", scheduler.expression()),
        Err(e) => warn!("Could not compute next poll cycle: {}", e),
    }

    let app = routes::router(state::AppState::new(controller, transport));
    let port = config.port.unwrap_or(9003);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Command surface listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    scheduler.shutdown().await?;
    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
