//! Connection and listener layer for msgsock.
//!
//! This is the "just works" layer. Connect to peers or accept them from a
//! listener, exchange discrete messages over one byte stream, with
//! opportunistic write batching and per-connection identifiers assigned at
//! accept time without dropping early data.

pub mod connection;
pub mod error;
pub mod event;
pub mod ident;
pub mod listener;

mod reader;
mod writer;

pub use connection::{Connection, ConnectionOptions, WriteOptions, DEFAULT_BATCH_WINDOW};
pub use error::{ConnError, ListenError, Result};
pub use event::{ConnectionEvent, ListenerEvent};
pub use ident::{IdError, IdGenerator, RandomId};
pub use listener::Listener;
