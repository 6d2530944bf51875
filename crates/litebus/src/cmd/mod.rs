use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use clap::{Args, Subcommand};
use litebus_bus::{Bus, BusError, BusListener};
use tracing::{info, warn};

use crate::exit::{bus_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

pub const DEFAULT_PORT: u16 = 11000;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a server that replies to every message.
    Serve(ServeArgs),
    /// Accept clients and print the messages they send.
    Listen(ListenArgs),
    /// Connect, send messages and optionally wait for replies.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// IP address to bind.
    #[arg(default_value = "0.0.0.0")]
    pub addr: String,
    /// TCP port to bind (0 picks a free port).
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Message sent to every client as soon as it is accepted.
    #[arg(long)]
    pub greeting: Option<String>,
    /// Prefix prepended to each reply.
    #[arg(long, default_value = "Reply: ")]
    pub reply_prefix: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// IP address to bind.
    #[arg(default_value = "0.0.0.0")]
    pub addr: String,
    /// TCP port to bind (0 picks a free port).
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server IP address.
    pub addr: String,
    /// Server TCP port.
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Message to send; repeat for several messages, sent in order.
    #[arg(long, short = 'd', required = true)]
    pub data: Vec<String>,
    /// Number of incoming messages to wait for and print before disconnecting.
    #[arg(long, default_value_t = 0)]
    pub wait: usize,
    /// Maximum total time to wait for incoming messages (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Why a server command stopped running.
#[derive(Debug)]
pub(crate) enum Stop {
    Interrupted,
    Finished,
    Failed(BusError),
}

pub(crate) fn stop_channel() -> (Sender<Stop>, Receiver<Stop>) {
    mpsc::channel()
}

/// Run the accept loop on a background thread until `stop` fires, Ctrl-C is
/// pressed or the loop fails. Every live connection is disconnected on the
/// way out.
pub(crate) fn serve_until_stopped(
    bus: &Bus,
    listener: BusListener,
    stop_tx: Sender<Stop>,
    stop_rx: Receiver<Stop>,
) -> CliResult<i32> {
    let interrupt_tx = stop_tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Stop::Interrupted);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install signal handler: {err}")))?;

    let accept_bus = bus.clone();
    thread::Builder::new()
        .name("litebus-accept".to_string())
        .spawn(move || {
            if let Err(err) = accept_bus.serve(listener) {
                let _ = stop_tx.send(Stop::Failed(err));
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("failed to spawn accept thread: {err}")))?;

    let stop = stop_rx.recv().unwrap_or(Stop::Interrupted);
    bus.disconnect();

    match stop {
        Stop::Interrupted => {
            info!("interrupted, shutting down");
            Ok(SUCCESS)
        }
        Stop::Finished => Ok(SUCCESS),
        Stop::Failed(err) => {
            warn!(error = %err, "accept loop failed");
            Err(bus_error("serve failed", err))
        }
    }
}
