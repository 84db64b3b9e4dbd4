//! Error type shared by every stage of a finger exchange.
//!
//! Each variant corresponds to one failure class and carries its own
//! process exit status, so only `main` decides how the process terminates.

use std::io;

/// Exit status for a successful exchange.
pub const EXIT_OK: u8 = 0;
/// Exit status for a wrong number of arguments.
pub const EXIT_USAGE: u8 = 1;
/// Exit status for an invalid or out-of-range port.
pub const EXIT_INVALID_PORT: u8 = 2;
/// Exit status for any I/O failure during the exchange.
pub const EXIT_IO: u8 = 3;
/// Exit status when the host address cannot be determined.
pub const EXIT_UNKNOWN_HOST: u8 = 4;
/// Exit status when the environment refuses to create the connection.
pub const EXIT_PERMISSION: u8 = 5;

/// Errors produced while resolving arguments or talking to the peer.
#[derive(Debug)]
pub enum FingerError {
    /// Wrong number of positional arguments, or an empty host.
    ArgumentCount(usize),
    /// The port looked numeric but is not in [0, 65535].
    PortRange(String),
    /// A non-port second argument and a third argument both claim the query.
    ArgumentConflict { second: String, third: String },
    /// The host name did not resolve to any address.
    HostResolution { host: String, source: Option<io::Error> },
    /// Connecting failed for a reason other than permissions.
    Connection { addr: String, source: io::Error },
    /// Socket creation or connect was denied by the environment.
    Permission { addr: String, source: io::Error },
    /// Sending the request failed.
    Write(io::Error),
    /// Reading the response failed partway through.
    Read(io::Error),
    /// Forwarding a response line to the output sink failed.
    Output(io::Error),
    /// Releasing one of the session resources failed.
    Close { resource: &'static str, source: io::Error },
    /// A session operation was invoked in the wrong state.
    OutOfOrder { op: &'static str, state: &'static str },
}

impl FingerError {
    /// Process exit status for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FingerError::ArgumentCount(_) => EXIT_USAGE,
            FingerError::PortRange(_) | FingerError::ArgumentConflict { .. } => EXIT_INVALID_PORT,
            FingerError::HostResolution { .. } => EXIT_UNKNOWN_HOST,
            FingerError::Permission { .. } => EXIT_PERMISSION,
            FingerError::Connection { .. }
            | FingerError::Write(_)
            | FingerError::Read(_)
            | FingerError::Output(_)
            | FingerError::Close { .. }
            | FingerError::OutOfOrder { .. } => EXIT_IO,
        }
    }

    /// Whether a usage line should accompany the message.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            FingerError::ArgumentCount(_)
                | FingerError::PortRange(_)
                | FingerError::ArgumentConflict { .. }
        )
    }
}

impl std::fmt::Display for FingerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FingerError::ArgumentCount(n) => {
                write!(f, "expected 1 to 3 arguments with a non-empty host, got {n}")
            }
            FingerError::PortRange(port) => {
                write!(f, "port '{port}' is invalid, it must be between 0 and 65535")
            }
            FingerError::ArgumentConflict { second, third } => write!(
                f,
                "'{second}' is not a valid port, and query '{third}' was also given"
            ),
            FingerError::HostResolution { host, source } => match source {
                Some(e) => write!(f, "could not resolve host '{host}': {e}"),
                None => write!(f, "could not resolve host '{host}': no addresses found"),
            },
            FingerError::Connection { addr, source } => {
                write!(f, "failed to connect to {addr}: {source}")
            }
            FingerError::Permission { addr, source } => {
                write!(f, "not permitted to connect to {addr}: {source}")
            }
            FingerError::Write(e) => write!(f, "failed to send query: {e}"),
            FingerError::Read(e) => write!(f, "failed to read response: {e}"),
            FingerError::Output(e) => write!(f, "failed to write response: {e}"),
            FingerError::Close { resource, source } => {
                write!(f, "failed to close {resource}: {source}")
            }
            FingerError::OutOfOrder { op, state } => {
                write!(f, "cannot {op} while session is {state}")
            }
        }
    }
}

impl std::error::Error for FingerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FingerError::HostResolution { source, .. } => {
                source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
            }
            FingerError::Connection { source, .. }
            | FingerError::Permission { source, .. }
            | FingerError::Close { source, .. } => Some(source),
            FingerError::Write(e) | FingerError::Read(e) | FingerError::Output(e) => Some(e),
            _ => None,
        }
    }
}
