use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use litebus_bus::ConnectionId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    connection: String,
    remote: String,
    size: usize,
    message: &'a str,
    timestamp: String,
}

pub fn print_message(message: &str, id: ConnectionId, remote: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", message_json(message, id, remote)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONNECTION", "REMOTE", "SIZE", "MESSAGE"])
                .add_row(vec![
                    id.to_string(),
                    remote.to_string(),
                    message.len().to_string(),
                    message.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "connection={id} remote={remote} size={} message={message}",
                message.len()
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{message}");
            let _ = out.flush();
        }
    }
}

fn message_json(message: &str, id: ConnectionId, remote: SocketAddr) -> String {
    let out = MessageOutput {
        connection: id.to_string(),
        remote: remote.to_string(),
        size: message.len(),
        message,
        timestamp: now_unix_seconds(),
    };
    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_carries_message_and_peer() {
        let remote: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let line = message_json("Hello Server", ConnectionId(2), remote);

        let value: serde_json::Value = serde_json::from_str(&line).expect("should be json");
        assert_eq!(value["connection"], "conn-2");
        assert_eq!(value["remote"], "127.0.0.1:4000");
        assert_eq!(value["size"], 12);
        assert_eq!(value["message"], "Hello Server");
    }
}
