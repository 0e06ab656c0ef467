//! TCP front end: accept loop, periodic matcher task, trade broadcast.
//!
//! Each accepted connection becomes a session task (see [`session`]) with an
//! unbounded outbound queue; a registry maps live client ids to their queue
//! so the matcher can fan trade lines out to everyone. All tasks observe one
//! cancellation token and are joined through a task tracker on shutdown.

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::order::ClientId;
use crate::protocol;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub mod session;

/// Live sessions and their outbound queues.
pub(crate) type Registry = Arc<RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind the configured address and serve until the token is cancelled.
pub async fn start(
    cfg: &ServerConfig,
    engine: Arc<Engine>,
    cancellation_token: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    serve(listener, cfg.clone(), engine, cancellation_token).await
}

/// Serve on an already-bound listener. Split out from [`start`] so tests can
/// bind an ephemeral port themselves.
pub async fn serve(
    listener: TcpListener,
    cfg: ServerConfig,
    engine: Arc<Engine>,
    cancellation_token: CancellationToken,
) -> Result<(), ServerError> {
    info!(addr = %listener.local_addr()?, "trading server listening");

    let registry: Registry = Arc::new(RwLock::new(HashMap::new()));
    let tracker = TaskTracker::new();

    tracker.spawn(run_matcher(
        engine.clone(),
        registry.clone(),
        Duration::from_millis(cfg.match_interval_ms),
        cancellation_token.clone(),
    ));

    let mut next_client_id: ClientId = 0;
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(error) => {
                        warn!(%error, "accept failed");
                        continue;
                    }
                };

                if registry.read().await.len() >= cfg.max_clients {
                    warn!(%peer, max_clients = cfg.max_clients, "rejecting connection: client limit reached");
                    continue;
                }

                next_client_id += 1;
                let client_id = next_client_id;
                info!(client_id, %peer, "client connected");

                let (out_tx, out_rx) = mpsc::unbounded_channel();
                registry.write().await.insert(client_id, out_tx.clone());

                tracker.spawn(session::run(
                    client_id,
                    stream,
                    engine.clone(),
                    out_tx,
                    out_rx,
                    registry.clone(),
                    cancellation_token.clone(),
                ));
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    info!(status = %engine.status(), "trading server stopped");
    debug!(book = %engine.snapshot(), "final book state");
    Ok(())
}

/// Periodically run a matching pass and broadcast the resulting trade lines
/// to every live session. Broadcasting happens after the book lock has been
/// released inside [`Engine::match_orders`].
async fn run_matcher(
    engine: Arc<Engine>,
    registry: Registry,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {
                let (trades, closed_orders) = engine.match_orders();
                if trades.is_empty() {
                    continue;
                }
                debug!(trades = trades.len(), closed = closed_orders.len(), "matching pass produced trades");

                let senders: Vec<_> = registry.read().await.values().cloned().collect();
                for trade in &trades {
                    let line = protocol::trade_line(trade);
                    for sender in &senders {
                        // A closed channel just means the session is going away.
                        let _ = sender.send(line.clone());
                    }
                }
            }
        }
    }
}
