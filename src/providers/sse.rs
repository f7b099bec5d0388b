//! Incremental decoding of `data:`-prefixed server-push event streams
//!
//! Network reads arrive as arbitrary byte chunks that are not aligned with
//! line boundaries (or even UTF-8 character boundaries). [`LineDecoder`]
//! accumulates bytes, emits every complete line, and carries the trailing
//! partial line into the next read. [`data_payloads`] lifts that into a
//! stream of `data:` payload strings over any byte stream. A partial line
//! longer than [`MAX_LINE_BYTES`] ends the stream with an error.
//!
//! Both the upstream relay and the chat client consume the same framing, so
//! both go through this module.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

/// Literal payload that terminates a stream out-of-band
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest partial line held back before the stream is abandoned
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Failure while reading `data:` payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError<E> {
    /// The underlying byte stream failed
    #[error("{0}")]
    Transport(E),

    /// A line grew past the limit without a terminator
    #[error("event line exceeded {0} bytes")]
    LineTooLong(usize),
}

/// Splits an incoming byte stream into complete lines
///
/// # Examples
///
/// ```
/// use chatrelay::providers::sse::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// assert!(decoder.push(b"data: hel").is_empty());
/// assert_eq!(decoder.push(b"lo\ndata: x"), vec!["data: hello".to_string()]);
/// assert_eq!(decoder.finish(), Some("data: x".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Creates an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completed
    ///
    /// Lines are returned without their terminator; a trailing `\r` is
    /// stripped so `\r\n` framing decodes the same as `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // The held-back bytes never contain a newline, so only the new
        // chunk needs scanning.
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            search_from = start;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Bytes of the partial line currently held back
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Flushes the held-back partial line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extracts the payload of a `data:` line
///
/// Returns `None` for blank lines, comments, and other SSE fields.
///
/// # Examples
///
/// ```
/// use chatrelay::providers::sse::data_payload;
///
/// assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
/// assert_eq!(data_payload("  data:[DONE]  "), Some("[DONE]"));
/// assert_eq!(data_payload(": keep-alive"), None);
/// assert_eq!(data_payload("event: ping"), None);
/// ```
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim().strip_prefix("data:").map(str::trim)
}

struct PayloadState<E> {
    bytes: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>,
    decoder: LineDecoder,
    max_line: usize,
    pending: VecDeque<String>,
    error: Option<PayloadError<E>>,
    finished: bool,
}

impl<E> PayloadState<E> {
    fn queue_line(&mut self, line: &str) {
        if let Some(data) = data_payload(line) {
            if !data.is_empty() {
                self.pending.push_back(data.to_string());
            }
        }
    }
}

/// Turns a raw byte stream into a stream of non-empty `data:` payloads
///
/// Payloads are yielded in arrival order, including the [`DONE_SENTINEL`];
/// interpreting them is up to the caller. A transport error or an overlong
/// line is yielded once and ends the stream.
pub fn data_payloads<S, E>(
    byte_stream: S,
) -> impl Stream<Item = std::result::Result<String, PayloadError<E>>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    data_payloads_with_limit(byte_stream, MAX_LINE_BYTES)
}

/// [`data_payloads`] with a custom line length limit
pub fn data_payloads_with_limit<S, E>(
    byte_stream: S,
    max_line: usize,
) -> impl Stream<Item = std::result::Result<String, PayloadError<E>>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    let state = PayloadState {
        bytes: Box::pin(byte_stream),
        decoder: LineDecoder::new(),
        max_line,
        pending: VecDeque::new(),
        error: None,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                return Some((Ok(payload), state));
            }
            if let Some(e) = state.error.take() {
                return Some((Err(e), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.decoder.push(&chunk) {
                        state.queue_line(&line);
                    }
                    if state.decoder.pending_len() > state.max_line {
                        state.finished = true;
                        state.error = Some(PayloadError::LineTooLong(state.max_line));
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.error = Some(PayloadError::Transport(e));
                }
                None => {
                    state.finished = true;
                    if let Some(line) = state.decoder.finish() {
                        state.queue_line(&line);
                    }
                }
            }
        }
    })
}
