use crate::ident::IdError;

/// Errors that can occur on a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] msgsock_transport::TransportError),

    /// Frame or message codec error.
    #[error("frame error: {0}")]
    Frame(#[from] msgsock_frame::FrameError),

    /// Identifier generation failed for an outbound connection.
    #[error("identifier generation failed: {0}")]
    Id(#[from] IdError),

    /// An I/O error occurred while writing to the stream.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is no longer open.
    #[error("connection is not open")]
    Disconnected,
}

/// Errors that can occur on a listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    /// Transport-level error (bind, accept, TLS handshake).
    #[error("transport error: {0}")]
    Transport(#[from] msgsock_transport::TransportError),

    /// Identifier generation failed; the affected raw connection is
    /// dropped and never surfaced as a [`crate::Connection`].
    #[error("identifier generation failed: {0}")]
    IdGeneration(#[from] IdError),
}

pub type Result<T> = std::result::Result<T, ConnError>;
