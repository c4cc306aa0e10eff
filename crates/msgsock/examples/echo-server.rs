//! Minimal echo server over TCP.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:4700 \
//!     --json '{"hello":"world"}' --wait --wait-timeout 3s

use msgsock::transport::ListenConfig;
use msgsock::{Connection, ConnectionEvent};

async fn echo(mut connection: Connection) {
    eprintln!("Connection opened: {}", connection.id());
    while let Some(event) = connection.next_event().await {
        match event {
            ConnectionEvent::Message(value) => {
                eprintln!("Echoing: {value}");
                if let Err(err) = connection.write(&value) {
                    eprintln!("Echo failed: {err}");
                    break;
                }
            }
            ConnectionEvent::Error(err) => eprintln!("Connection error: {err}"),
            ConnectionEvent::Closed => break,
        }
    }
    eprintln!("Connection closed: {}", connection.id());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Listening on 127.0.0.1:4700");
    msgsock::serve(ListenConfig::tcp("127.0.0.1:4700"), echo).await?;
    Ok(())
}
