use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use herald_config::ServerConfig;
use herald_protocol::{Frame, Opcode, close_code};

use super::*;
use crate::registry::ConnectionRegistry;
use crate::test_support::{handshake, recv_frame, send_frame, wait_for};

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_frame_size: 1024,
    }
}

async fn start_server() -> (std::net::SocketAddr, Arc<ConnectionRegistry>) {
    let server = Server::bind(&test_config()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    (addr, registry)
}

#[tokio::test]
async fn test_default_echo_wiring() {
    let (addr, _registry) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    handshake(&mut client, "/alice").await;
    send_frame(&mut client, Frame::text("hi")).await;

    let reply = recv_frame(&mut client).await;
    assert_eq!(reply.opcode, Opcode::Text);
    assert_eq!(reply.payload, b"Did you say: 'hi', sir?");
}

#[tokio::test]
async fn test_open_registers_and_delivery_roundtrip() {
    let (addr, registry) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    handshake(&mut client, "/alice").await;
    {
        let registry = Arc::clone(&registry);
        wait_for(move || registry.get("/alice").is_some()).await;
    }

    assert!(registry.deliver("/alice", "server push").await);
    let frame = recv_frame(&mut client).await;
    assert_eq!(frame.payload, b"server push");

    send_frame(&mut client, Frame::close(4000, "")).await;
    recv_frame(&mut client).await;
    {
        let registry = Arc::clone(&registry);
        wait_for(move || registry.is_empty()).await;
    }
    assert!(!registry.deliver("/alice", "too late").await);
}

#[tokio::test]
async fn test_policy_probe_over_tcp() {
    let (addr, registry) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(b"<policy-file-request/>\0").await.unwrap();
    let mut answer = Vec::new();
    client.read_to_end(&mut answer).await.unwrap();

    assert!(answer.starts_with(b"<?xml"));
    assert!(answer.ends_with(b"</cross-domain-policy>"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_oversized_frame_closes_with_1009() {
    let (addr, _registry) = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    handshake(&mut client, "/alice").await;
    send_frame(&mut client, Frame::binary(vec![0u8; 2048])).await;

    // The next frame is the close, not an echo: no message event fired.
    let close = recv_frame(&mut client).await;
    assert_eq!(close.opcode, Opcode::Close);
    assert_eq!(close.close_code(), Some(close_code::MESSAGE_TOO_LARGE));
}

#[tokio::test]
async fn test_connections_are_isolated_per_channel() {
    let (addr, registry) = start_server().await;
    let mut alice = TcpStream::connect(addr).await.unwrap();
    let mut bob = TcpStream::connect(addr).await.unwrap();

    handshake(&mut alice, "/alice").await;
    handshake(&mut bob, "/bob").await;
    {
        let registry = Arc::clone(&registry);
        wait_for(move || registry.len() == 2).await;
    }

    assert!(registry.deliver("/bob", "for bob only").await);
    let frame = recv_frame(&mut bob).await;
    assert_eq!(frame.payload, b"for bob only");

    // Alice got nothing; her next frame is the echo of her own message.
    send_frame(&mut alice, Frame::text("ping")).await;
    let reply = recv_frame(&mut alice).await;
    assert_eq!(reply.payload, b"Did you say: 'ping', sir?");
}

#[tokio::test]
async fn test_malformed_handshake_does_not_kill_server() {
    let (addr, registry) = start_server().await;

    let mut bad = TcpStream::connect(addr).await.unwrap();
    bad.write_all(b"POST /alice HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let mut rest = Vec::new();
    bad.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    // The accept loop is still serving.
    let mut good = TcpStream::connect(addr).await.unwrap();
    handshake(&mut good, "/carol").await;
    {
        let registry = Arc::clone(&registry);
        wait_for(move || registry.get("/carol").is_some()).await;
    }
}

#[tokio::test]
async fn test_premature_disconnect_is_swallowed() {
    let (addr, registry) = start_server().await;

    // Connect and vanish before sending anything.
    let client = TcpStream::connect(addr).await.unwrap();
    drop(client);

    let mut good = TcpStream::connect(addr).await.unwrap();
    handshake(&mut good, "/dave").await;
    {
        let registry = Arc::clone(&registry);
        wait_for(move || registry.get("/dave").is_some()).await;
    }
}
