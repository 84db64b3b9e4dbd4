//! Test doubles for the finger session.
//!
//! - `MockTransport`: in-memory stream that records writes, release order
//!   and shutdowns, and can be told to fail.
//! - `MockFingerServer`: loopback finger server on a background Tokio
//!   runtime that answers every connection with a fixed response.
//! - `LogCapture`: collects formatted tracing output for assertions.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::session::Transport;

/// State shared by every handle cloned from one `MockTransport`.
#[derive(Debug, Default)]
pub struct Shared {
    pub input: Vec<u8>,
    pub pos: usize,
    /// Reads fail with `ConnectionReset` once `pos` reaches this offset.
    pub fail_read_at: Option<usize>,
    pub fail_write: bool,
    pub fail_shutdown: bool,
    pub written: Vec<u8>,
    pub shutdowns: usize,
    /// Handle ids in the order they were dropped.
    pub dropped: Vec<u32>,
    next_id: u32,
}

#[derive(Debug)]
pub struct MockTransport {
    id: u32,
    shared: Rc<RefCell<Shared>>,
}

impl MockTransport {
    /// Id of the original handle, kept by the session as its connection.
    pub const CONNECTION: u32 = 0;
    /// Id of the first clone, which the session wraps as its writer.
    pub const WRITER: u32 = 1;
    /// Id of the second clone, which the session wraps as its reader.
    pub const READER: u32 = 2;

    pub fn new(input: &[u8]) -> (Self, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared {
            input: input.to_vec(),
            next_id: 1,
            ..Shared::default()
        }));
        let transport = Self {
            id: Self::CONNECTION,
            shared: Rc::clone(&shared),
        };
        (transport, shared)
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        let mut end = shared.input.len();

        if let Some(fail_at) = shared.fail_read_at {
            if shared.pos >= fail_at {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            end = end.min(fail_at);
        }

        let n = (end - shared.pos).min(buf.len());
        let start = shared.pos;
        buf[..n].copy_from_slice(&shared.input[start..start + n]);
        shared.pos += n;
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        if shared.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        shared.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn try_clone(&self) -> io::Result<Self> {
        let mut shared = self.shared.borrow_mut();
        let id = shared.next_id;
        shared.next_id += 1;
        Ok(Self {
            id,
            shared: Rc::clone(&self.shared),
        })
    }

    fn shutdown(&self) -> io::Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.shutdowns += 1;
        if shared.fail_shutdown {
            return Err(io::Error::new(io::ErrorKind::Other, "shutdown failed"));
        }
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.borrow_mut().dropped.push(self.id);
    }
}

/// Finger server bound to an ephemeral loopback port.
pub struct MockFingerServer {
    addr: SocketAddr,
    requests: mpsc::Receiver<Vec<u8>>,
}

impl MockFingerServer {
    /// Serve `response` to every client, then close the connection.
    pub fn spawn(response: &'static [u8]) -> Self {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let (tx, requests) = mpsc::channel();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = TcpListener::from_std(std_listener).unwrap();
                loop {
                    let (stream, _) = listener.accept().await.unwrap();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Ok(request) = handle_connection(stream, response).await {
                            let _ = tx.send(request);
                        }
                    });
                }
            });
        });

        Self { addr, requests }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The raw request line received by the next completed connection.
    pub fn next_request(&self) -> Vec<u8> {
        self.requests.recv_timeout(Duration::from_secs(5)).unwrap()
    }
}

/// Read one request line, answer it and close.
async fn handle_connection(stream: TcpStream, response: &[u8]) -> io::Result<Vec<u8>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut request = Vec::with_capacity(64);

    reader.read_until(b'\n', &mut request).await?;
    writer.write_all(response).await?;
    writer.shutdown().await?;

    Ok(request)
}

/// Buffer that a fmt subscriber writes into.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A WARN-level subscriber without ANSI colors that writes here.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let capture = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || capture.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
