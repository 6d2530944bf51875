//! Server and client on the same process, talking over loopback.
//!
//! Run with:
//!   cargo run --example server-and-client

use std::thread;
use std::time::Duration;

use litebus::{Bus, BusEvents};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Bus::new(
        BusEvents::new()
            .on_client_connected(|client| {
                println!("Client {} connected", client.remote_addr());
                let _ = client.send("hello client");
            })
            .on_message(|client, message| {
                println!("Message received from {}: {message}", client.remote_addr());
                let _ = client.send(&format!("Ok Received: {message}"));
            })
            .on_disconnect(|client| {
                println!("Client {} disconnected", client.remote_addr());
            }),
    );
    let listener = server.bind("127.0.0.1", 0)?;
    let port = listener.local_addr().port();

    let accept = server.clone();
    thread::spawn(move || {
        if let Err(err) = accept.serve(listener) {
            eprintln!("server stopped: {err}");
        }
    });

    let client = Bus::new(
        BusEvents::new()
            .on_connect(|conn| {
                println!("Client {} connected to {}", conn.local_addr(), conn.remote_addr());
                let _ = conn.send("Thanks for accepting me :D");
                let _ = conn.send("Message one");
            })
            .on_message(|_, message| println!("Client received a message: {message}")),
    );
    client.connect("127.0.0.1", port)?;

    thread::sleep(Duration::from_secs(1));
    client.send("Message two after one second")?;
    thread::sleep(Duration::from_millis(500));

    client.disconnect();
    thread::sleep(Duration::from_millis(200));
    server.disconnect();
    Ok(())
}
