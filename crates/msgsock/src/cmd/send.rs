use std::time::Duration;

use msgsock_conn::{Connection, ConnectionEvent, ConnectionOptions, WriteOptions};
use msgsock_frame::Framing;
use msgsock_transport::ConnectConfig;

use crate::cmd::SendArgs;
use crate::exit::{conn_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    if args.json.is_empty() {
        return Err(CliError::new(USAGE, "at least one --json message required"));
    }
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let mut messages = Vec::with_capacity(args.json.len());
    for raw in &args.json {
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        messages.push(value);
    }

    let options = ConnectionOptions {
        framing: if args.delimited {
            Framing::Delimited
        } else {
            Framing::LengthPrefixed
        },
        ..ConnectionOptions::default()
    };
    let mut connection = Connection::connect(&ConnectConfig::tcp(&args.addr), options)
        .await
        .map_err(|err| conn_error("connect failed", err))?;

    let write_options = WriteOptions {
        batch: args.batch,
        ..WriteOptions::default()
    };
    for value in &messages {
        connection
            .write_with(value, &write_options)
            .map_err(|err| conn_error("send failed", err))?;
    }

    if args.wait {
        let response = tokio::time::timeout(wait_timeout, wait_for_message(&mut connection))
            .await
            .map_err(|_| CliError::new(TIMEOUT, "timed out waiting for response"))?;
        match response {
            Some(value) => print_message(&value, connection.id(), format),
            None => return Err(CliError::new(crate::exit::FAILURE, "peer closed early")),
        }
    }

    connection
        .end()
        .map_err(|err| conn_error("close failed", err))?;
    Ok(SUCCESS)
}

async fn wait_for_message(connection: &mut Connection) -> Option<serde_json::Value> {
    while let Some(event) = connection.next_event().await {
        match event {
            ConnectionEvent::Message(value) => return Some(value),
            ConnectionEvent::Error(_) => continue,
            ConnectionEvent::Closed => return None,
        }
    }
    None
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
