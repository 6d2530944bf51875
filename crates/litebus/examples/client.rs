//! Client: connects to the reply server and sends two messages.
//!
//! Run with:
//!   cargo run --example client

use std::io::BufRead;

use litebus::{Bus, BusEvents};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let events = BusEvents::new()
        .on_connect(|conn| {
            println!("Connected on {} to {}", conn.local_addr(), conn.remote_addr());
            for text in ["Hello Server", "I am the client 1"] {
                if let Err(err) = conn.send(text) {
                    eprintln!("send failed: {err}");
                }
            }
        })
        .on_message(|_, message| println!("The server says: {message}"))
        .on_disconnect(|_| println!("Server closed the connection"));

    let bus = Bus::new(events);
    bus.connect("127.0.0.1", 11000)?;

    println!("Press enter to exit");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    bus.disconnect();
    Ok(())
}
