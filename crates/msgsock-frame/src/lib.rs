//! Message framing and reassembly for msgsock.
//!
//! This is the core value-add layer of msgsock. Two framings are supported:
//! - **Length-prefixed** (default): a 4-byte big-endian payload length
//!   before each payload. Payload bytes are transmitted unmodified.
//! - **Delimited** (legacy wire format): each payload is terminated by a
//!   U+0017 (End of Transmission Block) byte. Delimiter bytes occurring
//!   inside a payload are stripped before transmission, which loses data;
//!   use this framing only when wire compatibility requires it.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    decode_frame, encode_frame, FrameDecoder, Framing, DEFAULT_MAX_FRAME, DELIMITER,
    LENGTH_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{JsonCodec, MessageCodec, WriteFilter};
