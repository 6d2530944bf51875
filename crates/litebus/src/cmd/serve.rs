use litebus_bus::{Bus, BusEvents};
use tracing::{info, warn};

use crate::cmd::{serve_until_stopped, stop_channel, ServeArgs};
use crate::exit::{bus_error, CliResult};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let greeting = args.greeting.clone();
    let prefix = args.reply_prefix.clone();

    let events = BusEvents::new()
        .on_client_connected(move |conn| {
            if let Some(greeting) = &greeting {
                if let Err(err) = conn.send(greeting) {
                    warn!(conn = %conn.id(), error = %err, "greeting failed");
                }
            }
        })
        .on_message(move |conn, message| {
            print_message(message, conn.id(), conn.remote_addr(), format);
            let reply = format!("{prefix}{message}");
            if let Err(err) = conn.send(&reply) {
                warn!(conn = %conn.id(), error = %err, "reply failed");
            }
        });

    let bus = Bus::new(events);
    let listener = bus
        .bind(&args.addr, args.port)
        .map_err(|err| bus_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "reply server listening");

    let (stop_tx, stop_rx) = stop_channel();
    serve_until_stopped(&bus, listener, stop_tx, stop_rx)
}
