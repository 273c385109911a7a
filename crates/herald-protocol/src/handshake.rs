//! HTTP upgrade handshake and the legacy cross-domain policy probe.
//!
//! The handshake is a single request/response exchange: the client sends an
//! HTTP GET with an upgrade header set, the server answers `101 Switching
//! Protocols` with the accept digest, and the transport switches to framed
//! mode. The request path names the channel the connection registers under.

use std::collections::HashMap;

use base64::Engine;
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

/// GUID appended to the client key when computing the accept digest.
const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Literal prefix identifying a legacy cross-domain policy request.
pub const POLICY_PROBE: &[u8] = b"<policy-file-request";

/// Fixed policy document returned to a policy probe. The probe is handled
/// transparently: no session is established and no hooks fire.
pub const CROSS_DOMAIN_POLICY: &str = "<?xml version=\"1.0\"?><cross-domain-policy><allow-access-from domain=\"*\" to-ports=\"*\"/></cross-domain-policy>";

/// A parsed client upgrade request.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// Request path; used as the channel name.
    pub path: String,
    /// The client's `Sec-WebSocket-Key`.
    pub key: String,
    /// All request headers, names lowercased.
    pub headers: HashMap<String, String>,
}

/// Classify partially received bytes as a policy probe.
///
/// `Some(true)` means the probe prefix matched, `Some(false)` means the data
/// cannot be a probe, and `None` means more bytes are needed to decide.
pub fn is_policy_probe(buf: &[u8]) -> Option<bool> {
    if buf.len() < POLICY_PROBE.len() {
        return if POLICY_PROBE.starts_with(buf) {
            None
        } else {
            Some(false)
        };
    }
    Some(buf.starts_with(POLICY_PROBE))
}

/// Try to parse a complete upgrade request from `buf`.
///
/// Returns `Ok(None)` while the request head is still incomplete. On
/// success, returns the parsed request plus the number of bytes consumed.
pub fn parse_request(buf: &[u8]) -> Result<Option<(HandshakeRequest, usize)>, HandshakeError> {
    let Some(head_len) = find_header_end(buf) else {
        return Ok(None);
    };
    let head = std::str::from_utf8(&buf[..head_len])
        .map_err(|_| HandshakeError::MalformedRequest("non-UTF-8 request head".to_string()))?;

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HandshakeError::MalformedRequest(request_line.to_string()));
    };
    if method != "GET" {
        return Err(HandshakeError::UnsupportedMethod(method.to_string()));
    }
    if !version.starts_with("HTTP/1") {
        return Err(HandshakeError::MalformedRequest(request_line.to_string()));
    }

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(HandshakeError::MalformedHeader(line.to_string()));
        };
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let upgrades = headers
        .get("upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrades {
        return Err(HandshakeError::NotAnUpgrade);
    }
    let key = headers
        .get("sec-websocket-key")
        .cloned()
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Key"))?;

    let request = HandshakeRequest {
        path: path.to_string(),
        key,
        headers,
    };
    Ok(Some((request, head_len + 4)))
}

/// The accept digest for a client key: base64(sha1(key + GUID)).
pub fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.as_bytes());
    sha.update(ACCEPT_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(sha.finalize())
}

/// The `101 Switching Protocols` response completing the upgrade.
pub fn accept_response(request: &HandshakeRequest) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(&request.key)
    )
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
