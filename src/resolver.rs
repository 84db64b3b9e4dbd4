//! Argument resolution for the finger client.
//!
//! Turns the raw positional arguments into a [`ResolvedRequest`]. The
//! second argument is ambiguous: it is a port when it passes the
//! port-candidate test and the query otherwise.
//!
//! ```text
//! <host>                  port 79, empty query
//! <host> <port>           query empty
//! <host> <query>          port 79
//! <host> <port> <query>
//! ```

use crate::error::FingerError;

/// The well-known finger port.
pub const DEFAULT_PORT: u16 = 79;

/// A validated request, ready to hand to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub host: String,
    pub port: u16,
    pub query: String,
}

/// Resolve 1 to 3 positional arguments into a request.
pub fn resolve(args: &[String]) -> Result<ResolvedRequest, FingerError> {
    let (host, port, query) = match args {
        [host] => (host, DEFAULT_PORT, String::new()),
        [host, second] => match parse_port(second)? {
            Some(port) => (host, port, String::new()),
            None => (host, DEFAULT_PORT, second.clone()),
        },
        [host, second, third] => match parse_port(second)? {
            Some(port) => (host, port, third.clone()),
            None => {
                return Err(FingerError::ArgumentConflict {
                    second: second.clone(),
                    third: third.clone(),
                })
            }
        },
        _ => return Err(FingerError::ArgumentCount(args.len())),
    };

    if host.is_empty() {
        return Err(FingerError::ArgumentCount(args.len()));
    }

    Ok(ResolvedRequest {
        host: host.clone(),
        port,
        query,
    })
}

/// Non-empty and made only of ASCII decimal digits. Range is not checked.
pub fn is_port_candidate(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `Ok(None)` when `s` is not a port candidate, `PortRange` when it is one
/// but does not fit in a port.
fn parse_port(s: &str) -> Result<Option<u16>, FingerError> {
    if !is_port_candidate(s) {
        return Ok(None);
    }

    // Digits only, so the sole failure left is overflow.
    s.parse::<u16>()
        .map(Some)
        .map_err(|_| FingerError::PortRange(s.to_string()))
}
