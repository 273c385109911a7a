//! Frame codec: wire encoding/decoding bounded by a maximum payload size.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ConnectionError, ProtocolError};
use crate::frame::{Frame, Opcode};

/// Decoder/encoder for opcode-tagged frames.
///
/// Inbound frames may be masked or unmasked; the decoder unmasks when the
/// mask bit is set. Outbound frames are written unmasked (server side).
/// Payloads larger than `max_frame_size` are rejected during decode, before
/// the body is buffered.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ConnectionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ConnectionError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let b0 = src[0];
        let b1 = src[1];
        if b0 & 0x70 != 0 {
            return Err(ProtocolError::ReservedBitsSet.into());
        }
        let fin = b0 & 0x80 != 0;
        let opcode = Opcode::try_from(b0 & 0x0F)?;
        let masked = b1 & 0x80 != 0;

        let (payload_len, header_len) = match (b1 & 0x7F) as usize {
            126 => {
                if src.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([src[2], src[3]]) as usize, 4)
            }
            127 => {
                if src.len() < 10 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&src[2..10]);
                let len = u64::from_be_bytes(raw);
                if len > self.max_frame_size as u64 {
                    return Err(ProtocolError::FrameTooLarge {
                        size: len as usize,
                        max: self.max_frame_size,
                    }
                    .into());
                }
                (len as usize, 10)
            }
            len => (len, 2),
        };

        if opcode.is_control() {
            if payload_len > 125 {
                return Err(ProtocolError::ControlFrameTooLong(payload_len).into());
            }
            if !fin {
                return Err(ProtocolError::FragmentedControlFrame.into());
            }
        }
        if payload_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            }
            .into());
        }

        let mask_len = if masked { 4 } else { 0 };
        let total = header_len + mask_len + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let mask = if masked {
            let key = [src[0], src[1], src[2], src[3]];
            src.advance(4);
            Some(key)
        } else {
            None
        };
        let mut payload = src.split_to(payload_len).to_vec();
        if let Some(key) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= key[i % 4];
            }
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ConnectionError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ConnectionError> {
        let fin_bit = if frame.fin { 0x80 } else { 0x00 };
        dst.put_u8(fin_bit | u8::from(frame.opcode));

        let len = frame.payload.len();
        if len < 126 {
            dst.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            dst.put_u8(126);
            dst.put_u16(len as u16);
        } else {
            dst.put_u8(127);
            dst.put_u64(len as u64);
        }
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
