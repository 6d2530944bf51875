use std::sync::atomic::{AtomicUsize, Ordering};

use litebus_bus::{Bus, BusEvents};
use tracing::info;

use crate::cmd::{serve_until_stopped, stop_channel, ListenArgs, Stop};
use crate::exit::{bus_error, CliError, CliResult, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }

    let (stop_tx, stop_rx) = stop_channel();
    let done_tx = stop_tx.clone();
    let received = AtomicUsize::new(0);
    let limit = args.count;

    let events = BusEvents::new().on_message(move |conn, message| {
        let seen = received.fetch_add(1, Ordering::SeqCst) + 1;
        if limit.is_some_and(|limit| seen > limit) {
            return;
        }
        print_message(message, conn.id(), conn.remote_addr(), format);
        if limit == Some(seen) {
            let _ = done_tx.send(Stop::Finished);
        }
    });

    let bus = Bus::new(events);
    let listener = bus
        .bind(&args.addr, args.port)
        .map_err(|err| bus_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "listening");

    serve_until_stopped(&bus, listener, stop_tx, stop_rx)
}
