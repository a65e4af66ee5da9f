//! Line-based codec for tokio.
//!
//! Reads `\n`-terminated lines (an optional trailing `\r` is stripped) and
//! writes lines terminated with `\r\n`. Line breaks and NUL inside an
//! outbound line are blanked so one write is always one command. Invalid UTF-8 is replaced rather than
//! rejected and over-long lines are discarded, so a misbehaving server can
//! never tear the connection down through framing alone.

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Default maximum inbound line length, tags included.
pub const DEFAULT_MAX_LINE: usize = 8 * 1024;

/// Line codec for IRC traffic.
#[derive(Debug)]
pub struct IrcLineCodec {
    /// Index of next byte to check for newline.
    next_index: usize,
    max_len: usize,
    /// Set while skipping the remainder of an over-long line.
    discarding: bool,
}

impl IrcLineCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                } else if src.len() > self.max_len {
                    warn!(limit = self.max_len, "Inbound line too long, discarding");
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                warn!(len = line.len(), limit = self.max_len, "Inbound line too long, discarding");
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }
}

impl Encoder<String> for IrcLineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        let line = line.trim_end_matches(['\r', '\n']);
        dst.reserve(line.len() + 2);
        if line.contains(['\r', '\n', '\0']) {
            warn!(line = %line.escape_debug(), "Control characters blanked in outbound line");
            dst.put_slice(line.replace(['\r', '\n', '\0'], " ").as_bytes());
        } else {
            dst.put_slice(line.as_bytes());
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
