use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use litebus_bus::{Bus, BusEvents, ConnectionId};
use litebus_frame::{EOF, EOM};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{bus_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

enum Incoming {
    Message {
        id: ConnectionId,
        remote: SocketAddr,
        text: String,
    },
    Closed,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    validate_messages(&args.data)?;

    let (tx, rx) = mpsc::channel();
    let closed_tx = tx.clone();
    let events = BusEvents::new()
        .on_message(move |conn, message| {
            let _ = tx.send(Incoming::Message {
                id: conn.id(),
                remote: conn.remote_addr(),
                text: message.to_string(),
            });
        })
        .on_disconnect(move |_| {
            let _ = closed_tx.send(Incoming::Closed);
        });

    let bus = Bus::new(events);
    let connection = bus
        .connect(&args.addr, args.port)
        .map_err(|err| bus_error("connect failed", err))?;
    debug!(conn = %connection.id(), remote = %connection.remote_addr(), "connected");

    for text in &args.data {
        if let Err(err) = bus.send(text) {
            bus.disconnect();
            return Err(bus_error("send failed", err));
        }
    }

    let result = wait_for_messages(&rx, args.wait, wait_timeout, format);
    bus.disconnect();
    result
}

fn validate_messages(messages: &[String]) -> CliResult<()> {
    match messages
        .iter()
        .find(|text| text.contains(EOM) || text.contains(EOF))
    {
        Some(text) => Err(CliError::new(
            USAGE,
            format!("message must not contain {EOM} or {EOF}: {text:?}"),
        )),
        None => Ok(()),
    }
}

fn wait_for_messages(
    rx: &Receiver<Incoming>,
    count: usize,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let deadline = Instant::now() + timeout;
    for received in 0..count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(Incoming::Message { id, remote, text }) => print_message(&text, id, remote, format),
            Ok(Incoming::Closed) | Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(
                    FAILURE,
                    format!("connection closed after {received} of {count} messages"),
                ));
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("timed out after {received} of {count} messages"),
                ));
            }
        }
    }
    Ok(SUCCESS)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
