// src/main.rs

//! # Dirbeat Main Entry Point
//!
//! This is the main entry point for the Dirbeat application. It initializes
//! configuration and logging, then launches the core async tasks: the poll
//! loop and the TCP status server in monitor mode, or the consuming client in
//! listener mode.
//!
//! ## Modules
//!
//! - [`config`]: Handles configuration loading and merging from CLI, file, and environment.
//! - [`event`]: Defines the status frame and watched-file events.
//! - [`scanner`]: Directory enumeration and content digesting.
//! - [`monitor`]: Change detection state and the periodic poll task.
//! - [`network`]: TCP status server and listener client.

mod config;
mod event;
mod monitor;
mod network;
mod scanner;

use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::monitor::{ChangeDetector, SharedState};

/// The main entry point for the Dirbeat application.
///
/// This function performs the following steps:
/// 1. Loads the application configuration from CLI, file, and environment.
/// 2. Initializes the tracing subscriber for logging.
/// 3. In monitor mode: primes the detector, binds the notification socket,
///    and spawns the poll and accept tasks.
/// 4. In listener mode: spawns the consuming client task.
/// 5. Waits for SIGINT or SIGTERM to initiate graceful shutdown of all tasks.
///
/// # Returns
/// Returns `Ok(())` if the application exits cleanly, or an error if
/// initialization fails.
#[tokio::main]
async fn main() -> Result<()> {
    let app_config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing subscriber for logging with environment filter and max level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app_config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(std::io::stderr) // Log to stderr
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");

    tracing::info!("Dirbeat starting with configuration: {:?}", app_config);

    // Shutdown signal channel for graceful shutdown of all tasks.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();

    if !app_config.listen {
        let root = match app_config.monitor_root() {
            Ok(root) => root,
            Err(e) => {
                tracing::error!("MONITOR MODE: {}. Specify a directory via CLI or in dirbeat.toml.", e);
                std::process::exit(1);
            }
        };
        tracing::info!(
            "MONITOR MODE: Watching directory {} with watch list {:?}",
            root.display(),
            app_config.watch_files
        );

        let state: SharedState = Arc::new(RwLock::new(ChangeDetector::new(root)));

        // Register the initial watch list; digests are captured eagerly for
        // files that already exist.
        {
            let mut detector = state.write();
            for file in &app_config.watch_files {
                detector.add_watch(file);
            }
        }

        // Take the first inventory before accepting clients, so the first
        // frame already reflects the real directory contents.
        if let Err(e) = monitor::prime_inventory(Arc::clone(&state)).await {
            tracing::error!("Initial directory scan failed: {}", e);
            std::process::exit(1);
        }

        // A bind failure (address in use, permission denied) is fatal.
        let listener = match network::bind_listener(&app_config).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("{:#}", e);
                std::process::exit(1);
            }
        };

        let monitor_config = Arc::clone(&app_config);
        let monitor_state = Arc::clone(&state);
        let monitor_shutdown_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) =
                monitor::run_monitor(monitor_config, monitor_state, monitor_shutdown_rx).await
            {
                tracing::error!("Monitor exited with error: {}", e);
            }
        }));

        let server_config = Arc::clone(&app_config);
        let server_shutdown_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) =
                network::run_server(server_config, listener, state, server_shutdown_rx).await
            {
                tracing::error!("Server exited with error: {}", e);
            }
        }));
    } else {
        tracing::info!("LISTENER MODE: Connecting to {}", app_config.socket_addr());
        let listener_config = Arc::clone(&app_config);
        let listener_shutdown_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = network::run_listener(listener_config, None, listener_shutdown_rx).await
            {
                tracing::error!("Listener exited with error: {}", e);
            }
        }));
    }

    // Wait for SIGINT or SIGTERM to initiate shutdown.
    wait_for_signal().await;

    // Signal all tasks to shutdown. The channel latches, so repeated signals
    // during the drain are harmless.
    if shutdown_tx.send(true).is_err() {
        tracing::error!("Failed to send shutdown signal");
    }

    // Wait for all tasks to complete.
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("A task panicked or exited with error: {}", e);
        }
    }

    tracing::info!("Dirbeat shut down gracefully.");
    Ok(())
}

/// Blocks until a termination signal arrives.
///
/// On unix both SIGINT and SIGTERM trigger shutdown; elsewhere only Ctrl-C is
/// available.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => tracing::info!("SIGINT received, initiating shutdown..."),
                        Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
                    },
                    _ = term.recv() => {
                        tracing::info!("SIGTERM received, initiating shutdown...");
                    }
                }
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("SIGINT received, initiating shutdown..."),
                    Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, initiating shutdown..."),
            Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
        }
    }
}
