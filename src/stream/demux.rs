//! Turns an arbitrarily-chunked upstream SSE byte stream into ordered
//! [`NormalizedEvent`]s.
//!
//! Complete lines are handled as soon as their newline arrives; the trailing
//! partial line stays buffered until the next chunk. Only `data: ` lines are
//! considered. `data: [DONE]` yields the terminal event, any other payload is
//! parsed as JSON and its provider-specific text delta is emitted when
//! non-empty. A payload that fails to parse is logged and skipped.

use memchr::memchr_iter;

use super::utf8::Utf8Decoder;
use super::NormalizedEvent;
use crate::error::RelayError;
use crate::protocol::delta::extract_delta;
use crate::protocol::ProviderKind;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Per-request demultiplexer state. Never shared between requests.
#[derive(Debug)]
pub struct StreamDemuxer {
    provider: ProviderKind,
    decoder: Utf8Decoder,
    buffer: String,
    terminated: bool,
    delta_count: usize,
    malformed_count: usize,
}

impl StreamDemuxer {
    #[must_use]
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            decoder: Utf8Decoder::default(),
            buffer: String::new(),
            terminated: false,
            delta_count: 0,
            malformed_count: 0,
        }
    }

    /// Feed one upstream chunk and append any events it completes to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<NormalizedEvent>) {
        let scan_from = self.buffer.len();
        self.decoder.decode_into(chunk, &mut self.buffer);
        self.drain_complete_lines(scan_from, out);
    }

    /// Upstream finished cleanly. Processes a final unterminated line, then
    /// appends the terminal event unless `[DONE]` was already seen.
    pub fn finish(&mut self, out: &mut Vec<NormalizedEvent>) {
        let scan_from = self.buffer.len();
        self.decoder.finish(&mut self.buffer);
        self.drain_complete_lines(scan_from, out);

        let tail = std::mem::take(&mut self.buffer);
        if !tail.is_empty() {
            self.process_line(&tail, out);
        }
        self.terminate(out);
    }

    /// Upstream failed mid-stream. Drops buffered text and appends the
    /// terminal event unless it was already emitted.
    pub fn abort(&mut self, out: &mut Vec<NormalizedEvent>) {
        self.buffer.clear();
        self.terminate(out);
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    #[must_use]
    pub fn delta_count(&self) -> usize {
        self.delta_count
    }

    #[must_use]
    pub fn malformed_count(&self) -> usize {
        self.malformed_count
    }

    fn terminate(&mut self, out: &mut Vec<NormalizedEvent>) {
        if !self.terminated {
            self.terminated = true;
            out.push(NormalizedEvent::Done);
        }
    }

    fn drain_complete_lines(&mut self, scan_from: usize, out: &mut Vec<NormalizedEvent>) {
        // Text before `scan_from` was scanned on an earlier call and holds no newline.
        let buffer = std::mem::take(&mut self.buffer);
        let mut line_start = 0;
        for rel_pos in memchr_iter(b'\n', &buffer.as_bytes()[scan_from..]) {
            let line_end = scan_from + rel_pos;
            self.process_line(&buffer[line_start..line_end], out);
            line_start = line_end + 1;
        }

        self.buffer = buffer;
        if line_start > 0 {
            self.buffer.drain(..line_start);
        }
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<NormalizedEvent>) {
        if line.trim().is_empty() {
            return;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        if self.terminated {
            tracing::debug!(line = %line, "ignoring upstream frame after terminal event");
            return;
        }

        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            self.terminate(out);
            return;
        }

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(parsed) => {
                let delta = extract_delta(self.provider, &parsed);
                if !delta.is_empty() {
                    self.delta_count += 1;
                    out.push(NormalizedEvent::Content(delta.to_owned()));
                }
            }
            Err(err) => {
                self.malformed_count += 1;
                let err = RelayError::MalformedFrame(err.to_string());
                tracing::warn!(error = %err, line = %line, "skipping unparseable upstream frame");
            }
        }
    }
}
