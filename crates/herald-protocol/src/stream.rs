//! Per-connection protocol state machine.
//!
//! [`FrameStream`] turns a raw duplex byte stream into discrete protocol
//! events: handshake completion, data messages, ping/pong, close. It owns
//! the handshake accumulation buffer (discarded once the upgrade completes)
//! and the frame codec, and enforces the state rules for every outbound
//! operation.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::FrameCodec;
use crate::error::{ConnectionError, ProtocolError, UsageError};
use crate::frame::{Frame, Message, Opcode, close_code};
use crate::handshake::{self, HandshakeRequest};

/// How long a locally initiated close waits for the peer's acknowledging
/// close frame before the transport is released anyway.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Protocol phase of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accumulating the upgrade request.
    Handshake,
    /// Framed mode; data and control frames flow.
    Open,
    /// A close frame has been sent; waiting for the peer's acknowledgement.
    Closing,
    /// Close handshake finished; terminal.
    Closed,
    /// Transport-level failure or handshake abort; terminal.
    Aborted,
}

/// One protocol event produced by [`FrameStream::next_event`].
#[derive(Debug)]
pub enum StreamEvent {
    /// Handshake completed; the request path names the channel.
    Opened { path: String },
    /// A data message (after fragment reassembly).
    Message(Message),
    /// Ping received; the pong reply has already been written.
    Ping(Vec<u8>),
    /// Pong received.
    Pong(Vec<u8>),
    /// Close handshake finished, whichever side initiated it.
    Closed { code: Option<u16> },
    /// Legacy policy probe answered and transport closed; no session was
    /// established and no hooks should fire.
    PolicyServed,
}

/// Protocol state machine over a duplex transport.
pub struct FrameStream<T> {
    io: T,
    state: StreamState,
    codec: FrameCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// In-flight fragmented message: original opcode plus assembled bytes.
    fragment: Option<(Opcode, Vec<u8>)>,
    request: Option<HandshakeRequest>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> FrameStream<T> {
    pub fn new(io: T, max_frame_size: usize) -> Self {
        Self {
            io,
            state: StreamState::Handshake,
            codec: FrameCodec::new(max_frame_size),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::new(),
            fragment: None,
            request: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The upgrade request, available once the handshake completed.
    pub fn request(&self) -> Option<&HandshakeRequest> {
        self.request.as_ref()
    }

    pub fn max_frame_size(&self) -> usize {
        self.codec.max_frame_size()
    }

    /// Wait for the next protocol event.
    ///
    /// Events are produced strictly in byte-arrival order. Once the stream
    /// is `Closed` or `Aborted`, this returns [`ConnectionError::Closed`].
    pub async fn next_event(&mut self) -> Result<StreamEvent, ConnectionError> {
        loop {
            match self.state {
                StreamState::Handshake => {
                    if let Some(event) = self.advance_handshake().await? {
                        return Ok(event);
                    }
                }
                StreamState::Open | StreamState::Closing => loop {
                    match self.codec.decode(&mut self.read_buf) {
                        Ok(Some(frame)) => {
                            if let Some(event) = self.handle_frame(frame).await? {
                                return Ok(event);
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            // No resync after a framing violation; drop the
                            // buffered bytes so they are not re-parsed.
                            self.read_buf.clear();
                            return Err(err);
                        }
                    }
                },
                StreamState::Closed | StreamState::Aborted => {
                    return Err(ConnectionError::Closed);
                }
            }
            if let Some(event) = self.fill_read_buf().await? {
                return Ok(event);
            }
        }
    }

    /// Send a text data frame. Valid only in `Open`.
    pub async fn send_text(&mut self, text: &str) -> Result<(), ConnectionError> {
        self.ensure_open()?;
        self.write_frame(Frame::text(text)).await
    }

    /// Send a ping. The peer must answer with a pong.
    pub async fn ping(&mut self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.ensure_open()?;
        self.write_frame(Frame::ping(payload)).await
    }

    /// Send an unsolicited pong, as the protocol allows.
    pub async fn pong(&mut self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.ensure_open()?;
        self.write_frame(Frame::pong(payload)).await
    }

    /// Close the connection cleanly on behalf of the application.
    ///
    /// `code` must fall in the application range 4000-4999; anything else
    /// is rejected before any bytes are written. An absent code becomes
    /// 1000 (normal closure).
    pub async fn close(
        &mut self,
        code: Option<u16>,
        reason: &str,
    ) -> Result<(), ConnectionError> {
        if let Some(code) = code {
            if !close_code::is_application(code) {
                return Err(UsageError::CloseCodeOutOfRange(code).into());
            }
        }
        self.close_with_code(code.unwrap_or(close_code::NORMAL), reason)
            .await
    }

    /// Close with a protocol- or framework-mandated code (1002/1007/1009/
    /// 3000). Idempotent: a no-op once closing has begun. Before the
    /// handshake completes there is nothing to close cleanly, so the
    /// transport is aborted instead.
    pub async fn close_with_code(
        &mut self,
        code: u16,
        reason: &str,
    ) -> Result<(), ConnectionError> {
        match self.state {
            StreamState::Open => {
                debug!(code, "closing connection");
                self.write_frame(Frame::close(code, reason)).await?;
                self.state = StreamState::Closing;
                Ok(())
            }
            StreamState::Handshake => {
                self.abort().await;
                Ok(())
            }
            StreamState::Closing | StreamState::Closed | StreamState::Aborted => Ok(()),
        }
    }

    /// Tear the transport down without a close frame.
    pub async fn abort(&mut self) {
        let _ = self.io.shutdown().await;
        self.state = StreamState::Aborted;
    }

    fn ensure_open(&self) -> Result<(), ConnectionError> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Handshake => Err(UsageError::SendBeforeOpen.into()),
            StreamState::Closing | StreamState::Closed | StreamState::Aborted => {
                Err(UsageError::SendAfterClose.into())
            }
        }
    }

    async fn advance_handshake(&mut self) -> Result<Option<StreamEvent>, ConnectionError> {
        match handshake::is_policy_probe(&self.read_buf) {
            None => return Ok(None),
            Some(true) => {
                trace!("serving cross-domain policy document");
                self.io
                    .write_all(handshake::CROSS_DOMAIN_POLICY.as_bytes())
                    .await?;
                self.io.flush().await?;
                let _ = self.io.shutdown().await;
                self.state = StreamState::Closed;
                return Ok(Some(StreamEvent::PolicyServed));
            }
            Some(false) => {}
        }

        match handshake::parse_request(&self.read_buf) {
            Ok(None) => Ok(None),
            Ok(Some((request, consumed))) => {
                let response = handshake::accept_response(&request);
                self.io.write_all(response.as_bytes()).await?;
                self.io.flush().await?;
                self.read_buf.advance(consumed);
                let path = request.path.clone();
                self.request = Some(request);
                self.state = StreamState::Open;
                trace!(%path, "handshake complete");
                Ok(Some(StreamEvent::Opened { path }))
            }
            Err(e) => {
                self.abort().await;
                Err(e.into())
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<Option<StreamEvent>, ConnectionError> {
        match frame.opcode {
            Opcode::Ping => {
                self.write_frame(Frame::pong(frame.payload.clone())).await?;
                Ok(Some(StreamEvent::Ping(frame.payload)))
            }
            Opcode::Pong => Ok(Some(StreamEvent::Pong(frame.payload))),
            Opcode::Close => {
                let code = frame.close_code();
                if self.state == StreamState::Open {
                    // Peer-initiated close: acknowledge before releasing.
                    self.write_frame(Frame::close(code.unwrap_or(close_code::NORMAL), ""))
                        .await?;
                }
                self.state = StreamState::Closed;
                Ok(Some(StreamEvent::Closed { code }))
            }
            Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                if self.state == StreamState::Closing {
                    // Data arriving after we initiated close is discarded.
                    return Ok(None);
                }
                Ok(self.assemble(frame)?.map(StreamEvent::Message))
            }
        }
    }

    /// Fold a data frame into the current message, honoring fragmentation.
    fn assemble(&mut self, frame: Frame) -> Result<Option<Message>, ConnectionError> {
        let max = self.codec.max_frame_size();
        if frame.opcode == Opcode::Continuation {
            let Some((opcode, mut assembled)) = self.fragment.take() else {
                return Err(ProtocolError::UnexpectedContinuation.into());
            };
            assembled.extend_from_slice(&frame.payload);
            if assembled.len() > max {
                return Err(ProtocolError::FrameTooLarge {
                    size: assembled.len(),
                    max,
                }
                .into());
            }
            if frame.fin {
                return complete_message(opcode, assembled).map(Some);
            }
            self.fragment = Some((opcode, assembled));
            return Ok(None);
        }

        if self.fragment.is_some() {
            return Err(ProtocolError::InterleavedDataFrame.into());
        }
        if frame.fin {
            return complete_message(frame.opcode, frame.payload).map(Some);
        }
        self.fragment = Some((frame.opcode, frame.payload));
        Ok(None)
    }

    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.write_buf.clear();
        self.codec.encode(frame, &mut self.write_buf)?;
        self.io.write_all(&self.write_buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Read more bytes, translating EOF and the closing grace period into
    /// terminal events.
    async fn fill_read_buf(&mut self) -> Result<Option<StreamEvent>, ConnectionError> {
        let n = if self.state == StreamState::Closing {
            match tokio::time::timeout(CLOSE_GRACE, self.io.read_buf(&mut self.read_buf)).await {
                Ok(read) => read?,
                Err(_) => {
                    debug!("peer did not acknowledge close within grace period");
                    self.state = StreamState::Closed;
                    return Ok(Some(StreamEvent::Closed { code: None }));
                }
            }
        } else {
            self.io.read_buf(&mut self.read_buf).await?
        };

        if n == 0 {
            return match self.state {
                StreamState::Closing => {
                    self.state = StreamState::Closed;
                    Ok(Some(StreamEvent::Closed { code: None }))
                }
                _ => {
                    self.state = StreamState::Aborted;
                    Err(ConnectionError::PeerDisconnected)
                }
            };
        }
        Ok(None)
    }
}

fn complete_message(opcode: Opcode, payload: Vec<u8>) -> Result<Message, ConnectionError> {
    match opcode {
        Opcode::Text => String::from_utf8(payload)
            .map(Message::Text)
            .map_err(|_| ProtocolError::InvalidUtf8.into()),
        _ => Ok(Message::Binary(payload)),
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
