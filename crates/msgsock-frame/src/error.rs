/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The message codec rejected a value on encode.
    #[error("message encode failed: {0}")]
    Encode(String),

    /// The message codec rejected a frame payload on decode.
    #[error("message decode failed: {0}")]
    Decode(String),

    /// A frame payload was not valid UTF-8.
    #[error("frame payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
