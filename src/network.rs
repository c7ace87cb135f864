//! Network module for the TCP status feed.
//!
//! The server side accepts any number of clients and gives each one an
//! independent broadcast loop that pushes a full [`StatusSnapshot`] frame
//! once per interval. The listener side is the consuming client: it connects,
//! reads newline-delimited frames, and decodes them.

use crate::config::AppConfig;
use crate::event::StatusSnapshot;
use crate::monitor::SharedState;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Sender;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, error, info, warn};

/// Binds the notification socket.
///
/// A bind failure (address in use, permission denied) is fatal at startup;
/// there is no retry.
pub async fn bind_listener(app_config: &AppConfig) -> Result<TcpListener> {
    let addr = app_config.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind notification socket on {}", addr))?;
    info!(
        "Listening for connections on {}",
        listener.local_addr().context("listener has no local address")?
    );
    Ok(listener)
}

/// Runs the accept loop.
///
/// Each accepted connection gets its own broadcast task; accept resumes
/// immediately and never waits on broadcast work. Accept errors while running
/// are logged and the loop continues. On shutdown the loop exits and the
/// listening socket is dropped.
pub async fn run_server(
    app_config: Arc<AppConfig>,
    listener: TcpListener,
    state: SharedState,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let interval = app_config.interval();
    let mut shutdown = shutdown_signal.clone();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        info!("New connection from {}", peer);
                        let client_state = Arc::clone(&state);
                        let client_shutdown = shutdown_signal.clone();
                        tokio::spawn(async move {
                            broadcast_loop(stream, peer, client_state, interval, client_shutdown)
                                .await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Accept loop shutting down due to signal.");
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Pushes one snapshot frame per interval to a single client until the
/// connection fails or shutdown is signalled.
///
/// Every failure here is local to this connection: the socket is closed and
/// only this task ends. A slow client stalls its own loop and nobody else's.
async fn broadcast_loop(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: SharedState,
    interval: Duration,
    shutdown_signal: WatchReceiver<bool>,
) {
    let mut shutdown = shutdown_signal.clone();

    loop {
        // One read guard for the whole capture keeps inventory and digests
        // consistent within a frame.
        let snapshot = state.read().snapshot();
        let mut frame = match serde_json::to_string(&snapshot) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize status frame for {}: {}", peer, e);
                break;
            }
        };
        frame.push('\n');

        if let Err(e) = stream.write_all(frame.as_bytes()).await {
            info!("Client {} disconnected: {}", peer, e);
            break;
        }
        debug!("Sent {} bytes to {}", frame.len(), peer);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("Broadcast loop for {} shutting down due to signal.", peer);
                    break;
                }
            }
        }
    }
    info!("Closing connection to {}", peer);
}

/// Runs the client: connect to a monitor and consume its status feed.
///
/// Each newline-delimited frame is decoded as a [`StatusSnapshot`] and
/// summarized to the log; a malformed frame is skipped and the stream
/// resynchronizes on the next newline. Peer close or a socket error ends the
/// loop. Decoded frames are optionally forwarded to `frame_tx` for an
/// embedding observer.
pub async fn run_listener(
    app_config: Arc<AppConfig>,
    frame_tx: Option<Sender<StatusSnapshot>>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let addr = app_config.socket_addr();
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to monitor at {}", addr))?;
    info!("Connected to monitor at {}", addr);

    let mut lines = BufReader::new(stream).lines();
    let mut shutdown = shutdown_signal.clone();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        match StatusSnapshot::decode(&line) {
                            Ok(snapshot) => {
                                info!(
                                    "Status update: {} files present, {} watched",
                                    snapshot.all_files.len(),
                                    snapshot.watched_files.len()
                                );
                                debug!("Snapshot: {:?}", snapshot);
                                if let Some(tx) = &frame_tx {
                                    if let Err(e) = tx.send(snapshot).await {
                                        error!("Failed to forward snapshot: {}", e);
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Skipping bad frame: {}. Data: {}", e, line);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("Connection closed by server.");
                        break;
                    }
                    Err(e) => {
                        error!("Socket error: {}", e);
                        break;
                    }
                }
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Listener shutting down due to signal.");
                    break;
                }
            }
        }
    }
    Ok(())
}
