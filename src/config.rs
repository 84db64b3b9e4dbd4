//! Configuration module for the finger client.
//!
//! Everything comes from the command line. Positional values are passed
//! through untouched, because deciding whether the second one is a port
//! or a query belongs to the resolver.
//!
//! Options must precede the hostname. Once the first positional is seen,
//! every later word is taken as a positional value, including ones that
//! start with `-`, so finger queries like `-l` pass through unchanged.

use clap::Parser;
use std::time::Duration;

/// Command-line arguments for the finger client
#[derive(Parser, Debug)]
#[command(name = "finger")]
#[command(author = "finger authors")]
#[command(version = "0.1.0")]
#[command(about = "Query a finger server", long_about = None)]
#[command(override_usage = "finger [OPTIONS] <hostname> [<port>] [<query>]")]
pub struct CliArgs {
    /// Hostname, then an optional port and/or query. Options must come first.
    #[arg(value_name = "ARGS", num_args = 0.., allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Connect, read and write timeout in seconds (default: wait indefinitely)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process arguments.
    pub fn load() -> Result<Self, clap::Error> {
        CliArgs::try_parse().map(Config::from)
    }
}

impl From<CliArgs> for Config {
    fn from(cli: CliArgs) -> Self {
        Config {
            args: cli.args,
            timeout: cli.timeout.map(Duration::from_secs),
            log_level: cli.log_level,
        }
    }
}
