//! relay-client: interactive terminal client for simple-relay.
//!
//! Type a line to have it logged and echoed by the server. Type
//! `terminate` to request a remote shutdown; the password is prompted for.

use clap::Parser;
use simple_relay::config::{self, TomlConfig};
use simple_relay::{Client, ClientError, Verdict};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "relay-client")]
#[command(version = "0.1.0")]
#[command(about = "Interactive client for simple-relay", long_about = None)]
struct ClientArgs {
    /// Path to TOML configuration file (reads the [server] section)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let file = match args.config {
        Some(ref path) => config::read_toml(path)?,
        None => TomlConfig::default(),
    };
    let host = args.host.unwrap_or(file.server.host);
    let port = args.port.unwrap_or(file.server.port);
    let addr = config::resolve(&host, port)?;

    println!("Sending handshake...");
    let mut client = Client::connect(addr)?;
    info!(server = %addr, "Connected");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Enter command or message: ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        if line == "terminate" {
            print!("Enter password: ");
            io::stdout().flush()?;
            let password = match lines.next() {
                Some(password) => password?,
                None => break,
            };

            match client.terminate(&password)? {
                Verdict::Authorized => {
                    println!("Password correct, terminating the server");
                    break;
                }
                Verdict::Denied => println!("Invalid password, server continues to run"),
                Verdict::Malformed => {
                    println!("Invalid password format, server continues to run")
                }
            }
        } else {
            match client.send_message(&line) {
                Ok(echo) => println!("Received from server: MESG {echo}"),
                Err(e @ ClientError::MessageTooLong { .. })
                | Err(e @ ClientError::MultilineMessage) => println!("Not sent: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
