//! simple-relay: a multi-client TCP message relay server
//!
//! Features:
//! - PING/PONG handshake before any session command
//! - MESG frames appended to a log file and echoed back
//! - Password-gated remote shutdown (TERM + PASS)
//! - Operator console (start, stop, status, exit) or headless mode
//! - Configuration via CLI arguments or TOML file

use simple_relay::config::Config;
use simple_relay::console::{self, Settings};
use simple_relay::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let settings = Settings {
        listen: config.listen_addr()?,
        log_file: config.log_file.clone(),
    };

    info!(
        listen = %settings.listen,
        log_file = %settings.log_file.display(),
        headless = config.headless,
        "Starting simple-relay"
    );

    let server = Server::new(config.password.as_bytes());

    if config.headless {
        run_headless(&server, &settings)
    } else {
        run_console(&server, &settings)
    }
}

/// Serve until a client issues an authorized TERM or a signal arrives.
fn run_headless(server: &Server, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    server.start(settings.listen, &settings.log_file)?;
    #[cfg(unix)]
    simple_relay::shutdown::spawn(server.clone(), || {})?;

    server.wait_until_stopped(None);
    info!("Server terminated");
    Ok(())
}

/// Drive the server from the operator console on stdin.
fn run_console(server: &Server, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    // The console is parked on stdin, so leave once the server is down.
    #[cfg(unix)]
    simple_relay::shutdown::spawn(server.clone(), || std::process::exit(0))?;

    let stdin = std::io::stdin();
    console::run(server, settings, stdin.lock(), std::io::stdout())?;
    Ok(())
}
