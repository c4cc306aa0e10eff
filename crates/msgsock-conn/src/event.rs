//! Event types delivered by connections and listeners.
//!
//! Each variant records whether the wrapper itself or the underlying
//! transport originates it, which is the routing contract: the wrapper
//! intercepts exactly the notifications whose meaning it changes and is
//! transparent for the rest.

use serde_json::Value;

use crate::connection::Connection;
use crate::error::{ConnError, ListenError};

/// Notifications observed on one [`Connection`].
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A complete frame arrived and decoded; transport-originated, decoded
    /// by the wrapper. Messages are delivered in wire order.
    Message(Value),
    /// Wrapper-originated: a per-frame decode failure, a framing fault, or
    /// a write error. The connection stays open unless [`Closed`] follows.
    ///
    /// [`Closed`]: ConnectionEvent::Closed
    Error(ConnError),
    /// Transport-originated: the stream reached EOF or was shut down. No
    /// further messages follow.
    Closed,
}

/// Notifications observed on one [`crate::Listener`].
#[derive(Debug)]
pub enum ListenerEvent {
    /// Wrapper-originated: an accepted stream was promoted to a
    /// [`Connection`] (id assigned, early data buffered for replay).
    Connection(Connection),
    /// An accept, TLS handshake, or identifier-generation failure. The
    /// listener keeps accepting.
    Error(ListenError),
}
