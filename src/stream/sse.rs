//! Line-level SSE handling: splitting upstream bytes into `data:` payloads
//! and framing outgoing chunks.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::StreamExt;
use memchr::memchr_iter;

use crate::transport::{BodyStream, TransportError};

/// Terminal frame of an OpenAI-style event stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Incremental splitter that yields the payload of every `data:` line.
///
/// Bytes may arrive split at arbitrary boundaries, including inside a
/// multi-byte character; lines are only decoded once complete. Lines that
/// are not `data:` lines, or are not valid UTF-8, are skipped.
#[derive(Debug, Default)]
pub struct DataLineDecoder {
    buffer: Vec<u8>,
    read_offset: usize,
}

impl DataLineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and append the payloads of completed `data:` lines.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut VecDeque<String>) {
        self.buffer.extend_from_slice(chunk);
        let scan_start = self.read_offset;
        let mut processed_up_to = self.read_offset;
        for rel_pos in memchr_iter(b'\n', &self.buffer[scan_start..]) {
            let line_end = scan_start + rel_pos;
            push_data_line(&self.buffer[processed_up_to..line_end], out);
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish_into(&mut self, out: &mut VecDeque<String>) {
        if self.read_offset < self.buffer.len() {
            push_data_line(&self.buffer[self.read_offset..], out);
        }
        self.buffer.clear();
        self.read_offset = 0;
    }
}

fn push_data_line(line: &[u8], out: &mut VecDeque<String>) {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Some(payload) = line.strip_prefix(b"data:") else {
        return;
    };
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    if let Ok(text) = std::str::from_utf8(payload) {
        out.push_back(text.to_string());
    }
}

/// Pull-driven reader of `data:` payloads from an upstream body.
///
/// Dropping the reader drops the body stream, which closes the upstream
/// connection.
pub struct UpstreamLines {
    body: BodyStream,
    decoder: DataLineDecoder,
    pending: VecDeque<String>,
    exhausted: bool,
    verbose: bool,
}

impl UpstreamLines {
    #[must_use]
    pub fn new(body: BodyStream, verbose: bool) -> Self {
        Self {
            body,
            decoder: DataLineDecoder::new(),
            pending: VecDeque::with_capacity(8),
            exhausted: false,
            verbose,
        }
    }

    /// Next `data:` payload, or `None` once the body is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a body read failure; the reader is exhausted afterwards.
    pub async fn next_data(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                if self.verbose {
                    tracing::debug!(line = %line, "upstream sse");
                }
                return Some(Ok(line));
            }
            if self.exhausted {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.decoder.feed_into(&chunk, &mut self.pending),
                Some(Err(err)) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
                None => {
                    self.exhausted = true;
                    self.decoder.finish_into(&mut self.pending);
                }
            }
        }
    }
}

/// Frame a JSON document as one SSE `data:` event.
#[must_use]
pub fn sse_data_frame(json: &str) -> Bytes {
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    Bytes::from(out)
}

/// Frame a JSON document as one NDJSON line.
#[must_use]
pub fn ndjson_line(json: &str) -> Bytes {
    let mut out = String::with_capacity(1 + json.len());
    out.push_str(json);
    out.push('\n');
    Bytes::from(out)
}
