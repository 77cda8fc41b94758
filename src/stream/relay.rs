use std::convert::Infallible;
use std::fmt::Display;
use std::time::Instant;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use smallvec::SmallVec;

use super::{NormalizedEvent, StreamDemuxer};
use crate::protocol::ProviderKind;

/// Identifies one relayed request in log output.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub request_seq: u64,
    pub model_id: String,
    pub provider: ProviderKind,
}

struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }

    #[inline]
    fn push(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }
}

/// Lifetime bookkeeping for one relayed stream. Logs on drop if the
/// downstream went away before the terminal frame was delivered.
struct RelayTracker {
    ctx: RelayContext,
    started: Instant,
    completed: bool,
}

impl RelayTracker {
    fn complete(&mut self, demux: &StreamDemuxer) {
        self.completed = true;
        tracing::info!(
            request_seq = self.ctx.request_seq,
            model = %self.ctx.model_id,
            deltas = demux.delta_count(),
            malformed = demux.malformed_count(),
            elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "chat stream completed"
        );
    }
}

impl Drop for RelayTracker {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(
                request_seq = self.ctx.request_seq,
                model = %self.ctx.model_id,
                "downstream closed before terminal event; upstream read aborted"
            );
        }
    }
}

struct RelayState<S> {
    upstream: std::pin::Pin<Box<S>>,
    demux: StreamDemuxer,
    events: Vec<NormalizedEvent>,
    pending: PendingFrames,
    terminal_queued: bool,
    tracker: RelayTracker,
}

impl<S> RelayState<S> {
    fn queue_events(&mut self) {
        for event in self.events.drain(..) {
            if self.terminal_queued {
                break;
            }
            self.terminal_queued = event.is_terminal();
            self.pending.push(event.encode());
        }
    }
}

/// Re-frame an upstream SSE byte stream into the downstream protocol.
///
/// Frames are yielded one per event as soon as they are decoded, so each is
/// written and flushed individually. The stream ends right after the single
/// terminal frame. Dropping it drops `byte_stream`, which aborts the
/// upstream read.
pub fn relay_event_stream<S, E>(
    byte_stream: S,
    ctx: RelayContext,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = RelayState {
        upstream: Box::pin(byte_stream),
        demux: StreamDemuxer::new(ctx.provider),
        events: Vec::with_capacity(8),
        pending: PendingFrames::new(),
        terminal_queued: false,
        tracker: RelayTracker {
            ctx,
            started: Instant::now(),
            completed: false,
        },
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.terminal_queued {
                state.tracker.complete(&state.demux);
                return None;
            }

            match state.upstream.as_mut().next().await {
                Some(Ok(chunk)) => state.demux.feed(&chunk, &mut state.events),
                Some(Err(err)) => {
                    tracing::warn!(
                        request_seq = state.tracker.ctx.request_seq,
                        model = %state.tracker.ctx.model_id,
                        error = %err,
                        "upstream stream failed mid-response; terminating"
                    );
                    state.demux.abort(&mut state.events);
                }
                None => state.demux.finish(&mut state.events),
            }
            state.queue_events();
        }
    })
}

/// Wrap a frame stream in a `200 text/event-stream` response.
#[must_use]
pub fn event_stream_response<S>(frames: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(frames));
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        http::HeaderName::from_static("x-accel-buffering"),
        http::HeaderValue::from_static("no"),
    );
    response
}
