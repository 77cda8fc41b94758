//! Upstream event-stream demultiplexing and downstream re-framing.

pub mod demux;
pub mod relay;
mod utf8;

pub use demux::StreamDemuxer;
pub use relay::{event_stream_response, relay_event_stream, RelayContext};

use bytes::Bytes;
use serde::Serialize;

/// Terminal frame written exactly once at the end of every relayed stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// One event in the downstream protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    /// A non-empty text delta.
    Content(String),
    /// End of stream.
    Done,
}

#[derive(Serialize)]
struct ContentPayload<'a> {
    content: &'a str,
}

impl NormalizedEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizedEvent::Done)
    }

    /// Encode as SSE wire text: `data: {"content":"..."}\n\n` or `data: [DONE]\n\n`.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            NormalizedEvent::Content(content) => {
                let json = serde_json::to_string(&ContentPayload { content })
                    .unwrap_or_else(|_| String::from("{\"content\":\"\"}"));
                Bytes::from(data_frame(&json))
            }
            NormalizedEvent::Done => Bytes::from_static(DONE_FRAME.as_bytes()),
        }
    }
}

/// Format an unnamed SSE frame around a single-line payload.
#[must_use]
pub fn data_frame(payload: &str) -> String {
    let mut out = String::with_capacity(8 + payload.len());
    out.push_str("data: ");
    out.push_str(payload);
    out.push_str("\n\n");
    out
}
