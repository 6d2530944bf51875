//! Reply server: greets each client and answers every message.
//!
//! Run with:
//!   cargo run --example reply-server
//!
//! In another terminal:
//!   cargo run --example client

use litebus::{Bus, BusEvents};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let events = BusEvents::new()
        .on_client_connected(|client| {
            println!("Client {} connected", client.remote_addr());
            if let Err(err) = client.send("hello client") {
                eprintln!("greeting failed: {err}");
            }
        })
        .on_message(|client, message| {
            println!("Message received from {}: {message}", client.remote_addr());
            if let Err(err) = client.send(&format!("Reply: {message}")) {
                eprintln!("reply failed: {err}");
            }
        })
        .on_disconnect(|client| {
            println!("Client {} disconnected", client.remote_addr());
        });

    let server = Bus::new(events);
    let listener = server.bind_any(11000)?;
    println!("Server started on {}", listener.local_addr());

    // Blocks for the life of the process.
    server.serve(listener)?;
    Ok(())
}
