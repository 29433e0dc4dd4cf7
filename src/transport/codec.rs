//! CRLF line framing for the chat socket.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Longest inbound line accepted, excluding the line ending.
pub const MAX_LINE_LEN: usize = 8191;

/// Splits the byte stream into lines and frames outbound lines with CRLF.
///
/// Decoding is lenient: invalid UTF-8 is replaced, a bare `\n` ends a line as
/// well as `\r\n`, and lines longer than the limit are dropped with a warning
/// instead of failing the stream.
#[derive(Clone, Debug)]
pub struct LineCodec {
    max_len: usize,
    // Where the newline search resumes, so partial lines are not rescanned.
    next_index: usize,
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(end)) => {
                    buf.advance(end + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let line = buf.split_to(end + 1);
                    self.next_index = 0;
                    let content = line[..end].strip_suffix(b"\r").unwrap_or(&line[..end]);
                    if content.len() > self.max_len {
                        warn!(len = content.len(), max = self.max_len, "dropping over-long line");
                        continue;
                    }
                    return Ok(Some(decode_line(content)));
                }
                (false, None) if buf.len() > self.max_len + 1 => {
                    warn!(
                        len = buf.len(),
                        max = self.max_len,
                        "dropping over-long line"
                    );
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if buf.is_empty() || self.discarding {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let rest = buf.split();
        Ok(Some(decode_line(&rest)))
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = io::Error;

    /// Writes `line` up to its first CR or LF, followed by CRLF.
    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), io::Error> {
        let line = line.as_ref();
        let line = line
            .find(['\r', '\n'])
            .map_or(line, |end| &line[..end]);
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
