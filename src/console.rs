//! Operator console: `start`, `stop`, `status` and `exit` against a server.

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::server::{LifecycleState, Server};

const PROMPT: &str = "Enter command (start, stop, status, exit): ";

/// Where `start` binds and logs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub log_file: PathBuf,
}

/// Parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Exit,
    Unknown,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        match line.trim().to_lowercase().as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "status" => Command::Status,
            "exit" | "quit" => Command::Exit,
            _ => Command::Unknown,
        }
    }
}

/// Run the console until `exit` or end of input. The server is stopped
/// before returning.
pub fn run<R: BufRead, W: Write>(
    server: &Server,
    settings: &Settings,
    input: R,
    mut output: W,
) -> io::Result<()> {
    let mut lines = input.lines();

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        match Command::parse(&line) {
            Command::Start => start(server, settings, &mut output)?,
            Command::Stop => {
                if server.state() == LifecycleState::Running {
                    server.stop();
                    writeln!(output, "Server stopped.")?;
                } else {
                    writeln!(output, "Server is not running.")?;
                }
            }
            Command::Status => {
                match server.local_addr() {
                    Some(addr) => writeln!(
                        output,
                        "Server is {} on {} with {} connection(s).",
                        server.state(),
                        addr,
                        server.connection_count()
                    )?,
                    None => writeln!(output, "Server is {}.", server.state())?,
                }
            }
            Command::Exit => break,
            Command::Unknown if line.trim().is_empty() => {}
            Command::Unknown => writeln!(output, "Unknown command: {}", line.trim())?,
        }
    }

    if server.state() == LifecycleState::Running {
        server.stop();
    }
    info!("Console closed");
    Ok(())
}

fn start<W: Write>(server: &Server, settings: &Settings, output: &mut W) -> io::Result<()> {
    if server.state() != LifecycleState::Stopped {
        return writeln!(output, "Server is already running.");
    }

    writeln!(output, "Starting server...")?;
    match server.start(settings.listen, &settings.log_file) {
        Ok(addr) => writeln!(output, "Server running on {addr}"),
        Err(e) => writeln!(output, "Failed to start server: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            listen: "127.0.0.1:0".parse().unwrap(),
            log_file: dir.path().join("log.txt"),
        }
    }

    fn drive(server: &Server, settings: &Settings, script: &str) -> String {
        let mut output = Vec::new();
        run(server, settings, script.as_bytes(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::parse("start"), Command::Start);
        assert_eq!(Command::parse("  STOP \n"), Command::Stop);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("quit"), Command::Exit);
        assert_eq!(Command::parse("restart"), Command::Unknown);
    }

    #[test]
    fn test_start_stop_exit() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new("password");
        let output = drive(&server, &settings(&dir), "start\nstart\nstop\nstop\nexit\n");

        assert!(output.contains("Server running on 127.0.0.1:"));
        assert!(output.contains("Server is already running."));
        assert!(output.contains("Server stopped."));
        assert!(output.contains("Server is not running."));
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_end_of_input_stops_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new("password");
        drive(&server, &settings(&dir), "start\n");
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_start_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new("password");
        let settings = Settings {
            listen: "127.0.0.1:0".parse().unwrap(),
            log_file: dir.path().join("missing").join("log.txt"),
        };
        let output = drive(&server, &settings, "start\nstatus\n");

        assert!(output.contains("Failed to start server"));
        assert!(output.contains("Server is stopped."));
    }

    #[test]
    fn test_unknown_command() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new("password");
        let output = drive(&server, &settings(&dir), "\nfrobnicate\n");
        assert!(output.contains("Unknown command: frobnicate"));
    }
}
