//! Herald wire protocol.
//!
//! Everything between raw bytes and protocol events lives here: the HTTP
//! upgrade handshake (and the legacy cross-domain policy probe), the frame
//! model and codec, the per-connection state machine, and the error
//! taxonomy the rest of the system classifies failures with.

pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod stream;

pub use codec::FrameCodec;
pub use error::{ConnectionError, HandshakeError, ProtocolError, UsageError};
pub use frame::{Frame, Message, Opcode, close_code};
pub use handshake::HandshakeRequest;
pub use stream::{CLOSE_GRACE, FrameStream, StreamEvent, StreamState};

/// Default per-connection frame size cap: 10 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;
