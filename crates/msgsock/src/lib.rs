//! Message-oriented connections over TCP and TLS.
//!
//! msgsock turns a raw byte stream into a sequence of discrete JSON
//! messages: length-prefixed framing with reassembly on the inbound side,
//! opportunistic write batching on the outbound side, and per-connection
//! identifiers assigned at accept time without losing early data.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP and TLS socket plumbing
//! - [`frame`] — Wire framing, reassembly, and message codecs
//! - [`conn`] — Connections, listeners, batching, and identifier assignment

use std::future::Future;

/// Re-export transport types.
pub mod transport {
    pub use msgsock_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgsock_frame::*;
}

/// Re-export connection types.
pub mod conn {
    pub use msgsock_conn::*;
}

pub use msgsock_conn::{
    Connection, ConnectionEvent, ConnectionOptions, Listener, ListenerEvent, WriteOptions,
};
pub use msgsock_transport::{ConnectConfig, ListenConfig};

/// Bind a listener with default connection options and start accepting.
pub async fn listen(config: ListenConfig) -> Result<Listener, conn::ListenError> {
    let mut listener = Listener::new(config);
    listener.listen().await?;
    Ok(listener)
}

/// Establish an outbound connection with default options.
pub async fn connect(config: &ConnectConfig) -> conn::Result<Connection> {
    Connection::connect(config, ConnectionOptions::default()).await
}

/// Accept connections and run `handler` for each on its own task.
///
/// Accept-path failures are logged and accepting continues. Returns when
/// the listener closes.
pub async fn serve<F, Fut>(config: ListenConfig, handler: F) -> Result<(), conn::ListenError>
where
    F: Fn(Connection) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut listener = Listener::new(config);
    listener.listen().await?;
    loop {
        match listener.next_event().await {
            Some(ListenerEvent::Connection(connection)) => {
                tokio::spawn(handler(connection));
            }
            Some(ListenerEvent::Error(err)) => {
                tracing::warn!(error = %err, "accept path error");
            }
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn echo(mut connection: Connection) {
        while let Some(event) = connection.next_event().await {
            if let ConnectionEvent::Message(value) = event {
                let _ = connection.write(&value);
            }
        }
    }

    #[tokio::test]
    async fn listen_and_connect_factories_roundtrip() {
        let mut server = listen(ListenConfig::tcp("127.0.0.1:0")).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            while let Some(event) = server.next_event().await {
                if let ListenerEvent::Connection(connection) = event {
                    tokio::spawn(echo(connection));
                }
            }
        });

        let mut client = connect(&ConnectConfig::tcp(addr.to_string())).await.unwrap();
        client.write(&json!({"echo": "me"})).unwrap();
        loop {
            match client.next_event().await {
                Some(ConnectionEvent::Message(value)) => {
                    assert_eq!(value, json!({"echo": "me"}));
                    break;
                }
                Some(_) => continue,
                None => panic!("connection ended before echo"),
            }
        }
    }
}
