//! Finger wire format.
//!
//! ```text
//! Request:  <query>\r\n
//! Response: <line>\n<line>\n...   until the server closes the connection
//! ```
//!
//! The response has no length prefix or end marker; EOF is the terminator.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, Write};

/// Request line terminator. Required by the protocol on every platform.
pub const CRLF: &[u8] = b"\r\n";

/// Frame a query as a request line.
pub fn encode_request(query: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(query.len() + CRLF.len());
    buf.put_slice(query.as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Strip a trailing `\n` and, if present, the `\r` before it.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => line,
    }
}

/// Destination for response lines, fed one line at a time as they arrive.
pub trait ResponseSink {
    /// Accept one response line, without its line ending.
    fn emit(&mut self, line: &[u8]) -> io::Result<()>;
}

/// Writes every line followed by `\n`.
#[derive(Debug)]
pub struct PrintLines<W: Write> {
    out: W,
}

impl<W: Write> PrintLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> ResponseSink for PrintLines<W> {
    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        self.out.write_all(line)?;
        self.out.write_all(b"\n")
    }
}

/// Collects lines, replacing invalid UTF-8.
impl ResponseSink for Vec<String> {
    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        self.push(String::from_utf8_lossy(line).into_owned());
        Ok(())
    }
}
