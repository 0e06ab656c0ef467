//! Per-connection command loop.
//!
//! A session reads at most 1024 bytes per receive and treats the decoded
//! chunk as command text: newline-separated lines are handled one command
//! each, and a chunk without a newline is a single command, so clients that
//! issue one command per write interoperate with or without terminators.
//! Replies and trade broadcasts both travel through the session's outbound
//! queue, giving the socket a single writer.

use crate::engine::Engine;
use crate::order::{ClientId, Side};
use crate::protocol::{self, Command, ParseError, Reply};
use crate::server::Registry;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read buffer size; also the largest payload handled as one chunk.
const RECV_BUFFER_SIZE: usize = 1024;

/// Drive one client connection until EOF, I/O failure, or shutdown.
pub(crate) async fn run(
    client_id: ClientId,
    stream: TcpStream,
    engine: Arc<Engine>,
    out_tx: mpsc::UnboundedSender<String>,
    out_rx: mpsc::UnboundedReceiver<String>,
    registry: Registry,
    cancellation_token: CancellationToken,
) {
    let peer = stream.peer_addr().ok();
    let (mut reader, writer) = stream.into_split();
    let writer_task = tokio::spawn(write_loop(client_id, writer, out_rx));

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    'session: loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            received = reader.read(&mut buf) => match received {
                Ok(0) => {
                    info!(client_id, ?peer, "client disconnected");
                    break;
                }
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]);
                    for reply in handle_chunk(&engine, client_id, &chunk) {
                        debug!(client_id, reply = %reply, "command handled");
                        if out_tx.send(reply).is_err() {
                            // Writer is gone; the connection is unusable.
                            break 'session;
                        }
                    }
                }
                Err(error) => {
                    warn!(client_id, ?peer, %error, "read failed");
                    break;
                }
            }
        }
    }

    registry.write().await.remove(&client_id);
    drop(out_tx);
    let _ = writer_task.await;
}

async fn write_loop(
    client_id: ClientId,
    mut writer: OwnedWriteHalf,
    mut out_rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(payload) = out_rx.recv().await {
        if let Err(error) = writer.write_all(payload.as_bytes()).await {
            warn!(client_id, %error, "write failed");
            break;
        }
    }
}

/// Turn one received chunk into the replies it produces, one per command.
/// A blank chunk reports an unknown command.
fn handle_chunk(engine: &Engine, client_id: ClientId, chunk: &str) -> Vec<String> {
    if chunk.trim().is_empty() {
        let error = ParseError::UnknownCommand(String::new());
        return vec![Reply::Error(error.to_string()).to_string()];
    }

    chunk
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| dispatch(engine, client_id, line).to_string())
        .collect()
}

/// Parse and execute a single command against the shared book.
fn dispatch(engine: &Engine, client_id: ClientId, input: &str) -> Reply {
    let command = match protocol::parse_command(input) {
        Ok(command) => command,
        Err(error) => return Reply::Error(error.to_string()),
    };

    match command {
        Command::Buy { quantity, price } => {
            match engine.add_order(Side::Bid, quantity, price, client_id) {
                Ok(id) => Reply::OrderAccepted(id),
                Err(error) => Reply::Error(error.to_string()),
            }
        }
        Command::Sell { quantity, price } => {
            match engine.add_order(Side::Ask, quantity, price, client_id) {
                Ok(id) => Reply::OrderAccepted(id),
                Err(error) => Reply::Error(error.to_string()),
            }
        }
        Command::Cancel { order_id } => match engine.cancel_order(order_id) {
            Ok(order) => Reply::CancelAccepted(order.id),
            Err(error) => Reply::Error(error.to_string()),
        },
        Command::Status => Reply::Status(engine.status()),
    }
}
