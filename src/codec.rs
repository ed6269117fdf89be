//! Frame assembly for server responses
//!
//! A logical IMAP response is a line, or a line interrupted by one or
//! more `{N}CRLF` literal payloads followed by further line content.
//! [`ResponseCodec`] walks the inbound buffer with a two-state machine
//! (reading a line / swallowing a counted literal) until one complete
//! logical response is buffered, then hands the whole frame to the
//! response parser. The codec never blocks the parser on a partial
//! literal: short buffers simply yield `None` until more bytes land.
//!
//! Error policy matches the connection's lenient stance: a frame that
//! fails to parse is dropped (`Error::Parse`, recoverable) while a
//! literal bigger than the configured cap poisons the connection
//! (`Error::Protocol`).

use crate::error::Error;
use crate::proto::response::parse_response;
use crate::proto::types::Response;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, PartialEq, Eq)]
enum DecodeState {
    /// Scanning for the CRLF that ends the current line; `consumed`
    /// bytes of the frame are already known good.
    Line { consumed: usize },
    /// The line announced a literal; wait until all `needed` octets
    /// of payload are buffered.
    Literal { consumed: usize, needed: usize },
}

#[derive(Debug)]
pub(crate) struct ResponseCodec {
    state: DecodeState,
    max_literal: usize,
}

impl ResponseCodec {
    pub(crate) const fn new(max_literal: usize) -> Self {
        Self {
            state: DecodeState::Line { consumed: 0 },
            max_literal,
        }
    }

    /// Position one past the `\n` of the next CRLF at or after
    /// `skip`, if buffered.
    fn find_line_end(skip: usize, src: &BytesMut) -> Option<usize> {
        src.iter()
            .enumerate()
            .skip(skip.max(1))
            .find(|(i, b)| **b == b'\n' && src[i - 1] == b'\r')
            .map(|(i, _)| i + 1)
    }

    /// If the line ending at `line_end` announces a literal, its
    /// octet count.
    fn literal_announcement(src: &[u8], line_end: usize) -> Option<usize> {
        let line = &src[..line_end.saturating_sub(2)];
        if line.last() != Some(&b'}') {
            return None;
        }
        let open = line.iter().rposition(|b| *b == b'{')?;
        let digits = &line[open + 1..line.len() - 1];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(digits).ok()?.parse().ok()
    }
}

impl Decoder for ResponseCodec {
    type Item = Response;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, Error> {
        loop {
            match self.state {
                DecodeState::Line { consumed } => {
                    let Some(line_end) = Self::find_line_end(consumed, src) else {
                        return Ok(None);
                    };
                    match Self::literal_announcement(src, line_end) {
                        Some(needed) => {
                            if needed > self.max_literal {
                                src.advance(line_end);
                                self.state = DecodeState::Line { consumed: 0 };
                                return Err(Error::Protocol(format!(
                                    "server literal of {needed} octets exceeds the \
                                     {} octet cap",
                                    self.max_literal
                                )));
                            }
                            src.reserve(needed);
                            self.state = DecodeState::Literal {
                                consumed: line_end,
                                needed,
                            };
                        }
                        None => {
                            self.state = DecodeState::Line { consumed: 0 };
                            let frame = &src[..line_end];
                            let parsed = match parse_response(frame) {
                                Ok((rest, response)) if rest.is_empty() => Ok(response),
                                Ok((rest, _)) => Err(Error::Parse(format!(
                                    "{} trailing bytes after response",
                                    rest.len()
                                ))),
                                Err(e) => Err(Error::Parse(format!(
                                    "malformed response {:?}: {e}",
                                    String::from_utf8_lossy(
                                        &frame[..frame.len().min(128)]
                                    ),
                                ))),
                            };
                            src.advance(line_end);
                            return parsed.map(Some);
                        }
                    }
                }
                DecodeState::Literal { consumed, needed } => {
                    if src.len() < consumed + needed {
                        return Ok(None);
                    }
                    self.state = DecodeState::Line {
                        consumed: consumed + needed,
                    };
                }
            }
        }
    }
}

/// The write side is a passthrough: command fragments arrive already
/// encoded and framed by the command encoder.
impl Encoder<&[u8]> for ResponseCodec {
    type Error = Error;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Error> {
        dst.extend_from_slice(item);
        Ok(())
    }
}
