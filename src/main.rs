//! finger: a client for the finger user information protocol
//!
//! Usage: `finger [OPTIONS] <hostname> [<port>] [<query>]`
//!
//! Sends one query line to the server, prints every response line to
//! stdout until the server closes the connection, and exits with a status
//! that identifies the failure class:
//!
//! - 0: success
//! - 1: wrong number of arguments
//! - 2: invalid port
//! - 3: I/O failure
//! - 4: unknown host
//! - 5: connection not permitted

mod config;
mod error;
mod protocol;
mod resolver;
mod session;
#[cfg(test)]
mod testing;

use std::io;
use std::process::ExitCode;

use config::Config;
use error::{FingerError, EXIT_OK, EXIT_USAGE};
use protocol::PrintLines;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: finger [OPTIONS] <hostname> [<port>] [<query>]";

fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    // Initialize logging; stdout carries the response
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&config) {
        Ok(lines) => {
            debug!(lines, "Finger exchange complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_usage() {
                eprintln!("{USAGE}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Resolve arguments and run one exchange, printing the response to stdout.
fn run(config: &Config) -> Result<usize, FingerError> {
    let request = resolver::resolve(&config.args)?;

    debug!(
        host = %request.host,
        port = request.port,
        query = %request.query,
        timeout = ?config.timeout,
        "Starting finger exchange"
    );

    let mut sink = PrintLines::new(io::stdout().lock());
    let lines = session::exchange(&request, config.timeout, &mut sink)?;
    drop(sink.into_inner().map_err(FingerError::Output)?);

    Ok(lines)
}
