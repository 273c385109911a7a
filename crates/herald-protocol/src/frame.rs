//! Frame model: opcodes, close codes, and payload helpers.

use crate::error::ProtocolError;

/// Close codes used on the wire.
pub mod close_code {
    /// Normal closure; the default when the application supplies no code.
    pub const NORMAL: u16 = 1000;
    /// Endpoint is going away.
    pub const GOING_AWAY: u16 = 1001;
    /// Protocol violation.
    pub const PROTOCOL_ERROR: u16 = 1002;
    /// Data of an unacceptable type.
    pub const UNSUPPORTED_DATA: u16 = 1003;
    /// Payload inconsistent with the frame type (e.g. non-UTF-8 text).
    pub const INVALID_PAYLOAD: u16 = 1007;
    /// Frame exceeded the configured maximum size.
    pub const MESSAGE_TOO_LARGE: u16 = 1009;
    /// Framework-reserved code used when an application hook fails.
    pub const APPLICATION_ERROR: u16 = 3000;
    /// Lower bound of the range reserved for application use.
    pub const APP_MIN: u16 = 4000;
    /// Upper bound of the range reserved for application use.
    pub const APP_MAX: u16 = 4999;

    /// Whether `code` falls in the range applications may use.
    pub fn is_application(code: u16) -> bool {
        (APP_MIN..=APP_MAX).contains(&code)
    }
}

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Control opcodes carry out-of-band signalling and must fit in a
    /// single unfragmented frame.
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(ProtocolError::InvalidOpcode(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        match opcode {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

/// One wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A final text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Text,
            payload: text.into().into_bytes(),
        }
    }

    /// A final binary frame.
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Binary,
            payload,
        }
    }

    pub fn ping(payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Ping,
            payload,
        }
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Pong,
            payload,
        }
    }

    /// A close frame carrying a 16-bit code plus UTF-8 reason text.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        Self {
            fin: true,
            opcode: Opcode::Close,
            payload,
        }
    }

    /// The close code carried by a close frame, if present.
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// The reason text carried by a close frame, if any.
    pub fn close_reason(&self) -> Option<String> {
        if self.opcode != Opcode::Close || self.payload.len() <= 2 {
            return None;
        }
        Some(String::from_utf8_lossy(&self.payload[2..]).into_owned())
    }
}

/// A decoded data message, after fragment reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Message::Text(text) => text.len(),
            Message::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
