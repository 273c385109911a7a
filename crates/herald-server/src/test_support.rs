//! Client-side helpers shared by connection and server tests.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use herald_protocol::{Frame, FrameCodec};

pub fn upgrade_request(path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    )
}

/// Perform the client side of the upgrade and return the response head.
pub async fn handshake<T>(client: &mut T, path: &str) -> String
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    client
        .write_all(upgrade_request(path).as_bytes())
        .await
        .unwrap();
    let head = read_head(client).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    head
}

/// Read up to and including the blank line terminating a response head.
pub async fn read_head<T: AsyncRead + Unpin>(client: &mut T) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        client.read_exact(&mut byte).await.unwrap();
        buf.push(byte[0]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).unwrap()
}

pub async fn send_frame<T: AsyncWrite + Unpin>(client: &mut T, frame: Frame) {
    let mut codec = FrameCodec::new(1 << 20);
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    client.write_all(&buf).await.unwrap();
}

pub async fn recv_frame<T: AsyncRead + Unpin>(client: &mut T) -> Frame {
    let mut codec = FrameCodec::new(1 << 20);
    let mut buf = BytesMut::new();
    loop {
        if let Some(frame) = codec.decode(&mut buf).unwrap() {
            return frame;
        }
        let n = client.read_buf(&mut buf).await.unwrap();
        assert!(n > 0, "transport closed while waiting for a frame");
    }
}

/// Poll `predicate` until it holds, panicking after ~1 s.
pub async fn wait_for(predicate: impl Fn() -> bool) {
    for _ in 0..100 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within the polling window");
}
