use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use msgsock_conn::{
    Connection, ConnectionEvent, ConnectionOptions, Listener, ListenerEvent,
};
use msgsock_frame::Framing;
use msgsock_transport::ListenConfig;

use crate::cmd::ListenArgs;
use crate::exit::{listen_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let options = ConnectionOptions {
        framing: if args.delimited {
            Framing::Delimited
        } else {
            Framing::LengthPrefixed
        },
        ..ConnectionOptions::default()
    };
    let mut listener =
        Listener::new(ListenConfig::tcp(&args.addr)).with_connection_options(options);
    listener
        .listen()
        .await
        .map_err(|err| listen_error("bind failed", err))?;

    // Every connection task funnels received messages through one channel
    // so printing and the --count limit stay in a single place.
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<(String, Value)>();
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                listener.close();
                return Ok(SUCCESS);
            }
            event = listener.next_event() => match event {
                Some(ListenerEvent::Connection(connection)) => {
                    tokio::spawn(pump_connection(connection, args.echo, msg_tx.clone()));
                }
                Some(ListenerEvent::Error(err)) => {
                    warn!(error = %err, "accept path error");
                }
                None => return Ok(SUCCESS),
            },
            received = msg_rx.recv() => {
                if let Some((id, value)) = received {
                    print_message(&value, &id, format);
                    printed = printed.saturating_add(1);
                    if let Some(count) = args.count {
                        if printed >= count {
                            listener.close();
                            return Ok(SUCCESS);
                        }
                    }
                }
            }
        }
    }
}

async fn pump_connection(
    mut connection: Connection,
    echo: bool,
    messages: mpsc::UnboundedSender<(String, Value)>,
) {
    let id = connection.id().to_string();
    debug!(%id, "connection opened");
    while let Some(event) = connection.next_event().await {
        match event {
            ConnectionEvent::Message(value) => {
                if echo {
                    if let Err(err) = connection.write(&value) {
                        warn!(%id, error = %err, "echo failed");
                    }
                }
                if messages.send((id.clone(), value)).is_err() {
                    return;
                }
            }
            ConnectionEvent::Error(err) => warn!(%id, error = %err, "connection error"),
            ConnectionEvent::Closed => break,
        }
    }
    debug!(%id, "connection closed");
}
