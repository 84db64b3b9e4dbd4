//! A single finger exchange over one connection.
//!
//! The session owns the connection plus a buffered writer and reader
//! cloned from it. All three are released together by [`Session::close`],
//! which also runs from `Drop` so an early `?` return cannot leak them.
//!
//! State transitions:
//!
//! ```text
//! open() -> Open -> send() -> RequestSent -> receive() -> ResponseComplete
//!                                                               |
//!        close() from any state -> Closed  <--------------------+
//! ```

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace, warn};

use crate::error::FingerError;
use crate::protocol::{encode_request, trim_line_ending, ResponseSink};
use crate::resolver::ResolvedRequest;

/// Initial capacity of the reusable response line buffer.
const LINE_CAPACITY: usize = 256;

/// A byte stream that can be split into independent read and write handles.
pub trait Transport: io::Read + io::Write + Sized {
    /// Create another handle to the same underlying stream.
    fn try_clone(&self) -> io::Result<Self>;

    /// Shut down both directions of the stream.
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing sent yet.
    Open,
    /// Request line written and flushed.
    RequestSent,
    /// Peer closed the stream after the response.
    ResponseComplete,
    /// Resources released.
    Closed,
}

impl SessionState {
    fn as_str(self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::RequestSent => "awaiting response",
            SessionState::ResponseComplete => "complete",
            SessionState::Closed => "closed",
        }
    }
}

/// One connection to a finger server.
#[derive(Debug)]
pub struct Session<T: Transport> {
    connection: Option<T>,
    writer: Option<BufWriter<T>>,
    reader: Option<BufReader<T>>,
    state: SessionState,
}

impl Session<TcpStream> {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// `timeout`, when set, bounds connect and every subsequent read and
    /// write. Without it a silent peer blocks forever.
    pub fn open(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self, FingerError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| FingerError::HostResolution {
                host: host.to_string(),
                source: Some(e),
            })?;

        let mut last_err = None;
        for addr in addrs {
            match connect(addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "Connected");
                    return Session::from_transport(stream).map_err(|source| {
                        FingerError::Connection {
                            addr: addr.to_string(),
                            source,
                        }
                    });
                }
                Err(e) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(keep_worse(last_err, e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| FingerError::HostResolution {
            host: host.to_string(),
            source: None,
        }))
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an already-connected transport.
    pub fn from_transport(connection: T) -> io::Result<Self> {
        let writer = BufWriter::new(connection.try_clone()?);
        let reader = BufReader::new(connection.try_clone()?);

        Ok(Self {
            connection: Some(connection),
            writer: Some(writer),
            reader: Some(reader),
            state: SessionState::Open,
        })
    }

    /// Current state, for tests
    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Write the framed query and flush it.
    pub fn send(&mut self, query: &str) -> Result<(), FingerError> {
        let state = self.state;
        let writer = match (state, self.writer.as_mut()) {
            (SessionState::Open, Some(writer)) => writer,
            _ => return Err(out_of_order("send", state)),
        };

        let request = encode_request(query);
        writer
            .write_all(&request)
            .and_then(|()| writer.flush())
            .map_err(FingerError::Write)?;

        trace!(bytes = request.len(), "Request sent");
        self.state = SessionState::RequestSent;
        Ok(())
    }

    /// Forward response lines to `sink` until the peer closes the stream.
    ///
    /// Returns the number of lines forwarded. A trailing line with no
    /// terminator is still forwarded.
    pub fn receive<S: ResponseSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize, FingerError> {
        let state = self.state;
        let reader = match (state, self.reader.as_mut()) {
            (SessionState::RequestSent, Some(reader)) => reader,
            _ => return Err(out_of_order("receive", state)),
        };

        let mut line = Vec::with_capacity(LINE_CAPACITY);
        let mut count = 0;

        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line).map_err(FingerError::Read)?;
            if n == 0 {
                break;
            }

            sink.emit(trim_line_ending(&line)).map_err(FingerError::Output)?;
            count += 1;
        }

        trace!(lines = count, "Response complete");
        self.state = SessionState::ResponseComplete;
        Ok(count)
    }

    /// Release the writer, the reader and then the connection.
    ///
    /// Every release is attempted. The first failure is returned, later
    /// ones are logged. Calling this again after it has run does nothing.
    pub fn close(&mut self) -> Result<(), FingerError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;

        let mut first: Option<FingerError> = None;
        let mut record = |resource: &'static str, source: io::Error| {
            let err = FingerError::Close { resource, source };
            if first.is_none() {
                first = Some(err);
            } else {
                warn!(error = %err, "Additional failure while closing session");
            }
        };

        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.into_inner() {
                let (source, writer) = err.into_parts();
                // Discard whatever could not be flushed.
                let _ = writer.into_parts();
                record("writer", source);
            }
        }

        drop(self.reader.take());

        if let Some(connection) = self.connection.take() {
            match connection.shutdown() {
                Ok(()) => {}
                // Peer already tore the connection down.
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => record("connection", e),
            }
        }

        trace!("Session closed");
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Send `query`, stream the response into `sink`, then close.
    ///
    /// The session is closed exactly once on every path. An error from the
    /// exchange takes precedence over one from closing.
    pub fn run<S: ResponseSink + ?Sized>(mut self, query: &str, sink: &mut S) -> Result<usize, FingerError> {
        let result = self.send(query).and_then(|()| self.receive(sink));
        let closed = self.close();

        if let (Err(_), Err(e)) = (&result, &closed) {
            warn!(error = %e, "Failed to close session");
        }

        let lines = result?;
        closed?;
        Ok(lines)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close session");
        }
    }
}

/// Perform one complete exchange for `request`.
pub fn exchange<S: ResponseSink + ?Sized>(
    request: &ResolvedRequest,
    timeout: Option<Duration>,
    sink: &mut S,
) -> Result<usize, FingerError> {
    Session::open(&request.host, request.port, timeout)?.run(&request.query, sink)
}

fn out_of_order(op: &'static str, state: SessionState) -> FingerError {
    FingerError::OutOfOrder {
        op,
        state: state.as_str(),
    }
}

/// A denied address outranks a refused one, so the exit status does not
/// depend on resolver ordering. Otherwise the latest failure wins.
fn keep_worse(prev: Option<FingerError>, next: FingerError) -> FingerError {
    match prev {
        Some(prev @ FingerError::Permission { .. }) => prev,
        _ => next,
    }
}

/// Map a socket setup failure for `addr` to its error class.
fn classify(addr: SocketAddr, source: io::Error) -> FingerError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        FingerError::Permission {
            addr: addr.to_string(),
            source,
        }
    } else {
        FingerError::Connection {
            addr: addr.to_string(),
            source,
        }
    }
}

/// Create a TCP socket for `addr` and connect it.
fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<TcpStream, FingerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| classify(addr, e))?;

    match timeout {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout),
        None => socket.connect(&addr.into()),
    }
    .map_err(|e| classify(addr, e))?;

    socket.set_read_timeout(timeout).map_err(|e| classify(addr, e))?;
    socket.set_write_timeout(timeout).map_err(|e| classify(addr, e))?;

    Ok(socket.into())
}
