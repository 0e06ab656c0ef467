//! End-to-end tests driving the server over real TCP connections.

use matchd::config::ServerConfig;
use matchd::engine::Engine;
use matchd::server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Spin up a server on an ephemeral port with a fast matching cadence.
async fn start_server() -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cfg = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 16,
        match_interval_ms: 20,
    };
    let engine = Arc::new(Engine::new());
    let cancellation_token = CancellationToken::new();

    let serve_token = cancellation_token.clone();
    tokio::spawn(async move {
        server::serve(listener, cfg, engine, serve_token)
            .await
            .unwrap();
    });

    (addr, cancellation_token)
}

/// Send one command and read one reply payload.
async fn send_command(stream: &mut TcpStream, command: &str) -> String {
    stream.write_all(command.as_bytes()).await.unwrap();
    read_some(stream).await
}

async fn read_some(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 1024];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("timed out waiting for server data")
        .unwrap();
    assert!(n > 0, "server closed the connection unexpectedly");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Keep reading until the accumulated stream contains `needle`.
async fn read_until_contains(stream: &mut TcpStream, acc: &mut String, needle: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !acc.contains(needle) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "never received {:?}; got {:?}",
            needle,
            acc
        );
        acc.push_str(&read_some(stream).await);
    }
}

#[tokio::test]
async fn test_status_on_empty_book() {
    let (addr, cancellation_token) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let reply = send_command(&mut client, "STATUS").await;
    assert_eq!(reply, "STATUS Orders: 0, Bid levels: 0, Ask levels: 0");

    cancellation_token.cancel();
}

#[tokio::test]
async fn test_command_replies_and_errors() {
    let (addr, cancellation_token) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let reply = send_command(&mut client, "BUY 0 100").await;
    assert!(
        reply.starts_with("ERROR") && reply.contains("positive"),
        "zero quantity must be rejected: {}",
        reply
    );
    let reply = send_command(&mut client, "STATUS").await;
    assert_eq!(
        reply, "STATUS Orders: 0, Bid levels: 0, Ask levels: 0",
        "a rejected order must leave the book unchanged"
    );

    let reply = send_command(&mut client, "CANCEL 999").await;
    assert!(
        reply.to_lowercase().contains("not found"),
        "unknown cancel id: {}",
        reply
    );

    let reply = send_command(&mut client, "PING").await;
    assert_eq!(reply, "ERROR Unknown command: PING");

    // Orders rest at distant prices so the matcher leaves them alone.
    let reply = send_command(&mut client, "BUY 10 100").await;
    assert_eq!(reply, "ORDER_ACCEPTED 1");
    let reply = send_command(&mut client, "SELL 5 200.5").await;
    assert_eq!(reply, "ORDER_ACCEPTED 2");
    let reply = send_command(&mut client, "STATUS").await;
    assert_eq!(reply, "STATUS Orders: 2, Bid levels: 1, Ask levels: 1");

    let reply = send_command(&mut client, "CANCEL 1").await;
    assert_eq!(reply, "CANCEL_ACCEPTED 1");
    let reply = send_command(&mut client, "CANCEL 1").await;
    assert!(reply.to_lowercase().contains("not found"));

    cancellation_token.cancel();
}

#[tokio::test]
async fn test_trade_broadcast_reaches_every_client() {
    let (addr, cancellation_token) = start_server().await;
    let mut buyer = TcpStream::connect(addr).await.unwrap();
    let mut seller = TcpStream::connect(addr).await.unwrap();

    let reply = send_command(&mut buyer, "BUY 10 100").await;
    assert_eq!(reply, "ORDER_ACCEPTED 1");
    let mut seller_acc = send_command(&mut seller, "SELL 4 100").await;
    assert!(seller_acc.contains("ORDER_ACCEPTED 2"), "got {:?}", seller_acc);

    // The periodic matcher crosses the book and fans the trade out to both
    // sessions, priced at the ask.
    let mut buyer_acc = String::new();
    read_until_contains(&mut buyer, &mut buyer_acc, "TRADE 1 2 4 100").await;
    read_until_contains(&mut seller, &mut seller_acc, "TRADE 1 2 4 100").await;

    // The larger buy order keeps its remainder resting.
    let reply = send_command(&mut buyer, "STATUS").await;
    assert_eq!(reply, "STATUS Orders: 1, Bid levels: 1, Ask levels: 0");

    cancellation_token.cancel();
}
