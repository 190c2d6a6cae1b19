//! `?stream` response rendering: emits the envelope as a sequence of SSE
//! events instead of one JSON body (§4.7).
//!
//! Event order: `api`, one `data` event per array item in the semantic
//! payload (or a single `data` event when the payload isn't an array),
//! `links`, then `done: {"ok": true}`. An error short-circuits the
//! sequence with a single `error` event — `gateway_runtime::sse_error_event`
//! is reused for its shape.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};
use gateway_core::{Envelope, GatewayError};

use crate::error::sse_error_event;

fn json_event(name: &str, value: &serde_json::Value) -> Event {
    Event::default()
        .event(name)
        .json_data(value)
        .unwrap_or_else(|_| Event::default().event(name).data(value.to_string()))
}

/// Build the ordered event sequence for a successful envelope: `api`,
/// per-item (or single) `data`, `links`, `done`.
fn success_events(envelope: &Envelope) -> Vec<Event> {
    let rendered = envelope.to_ordered_value();
    let mut events = Vec::new();
    if let Some(api) = rendered.get("api") {
        events.push(json_event("api", api));
    }
    match envelope.semantic_value() {
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                events.push(json_event("data", item));
            }
        }
        Some(value) => events.push(json_event("data", value)),
        None => {}
    }
    if let Some(links) = rendered.get("links") {
        events.push(json_event("links", links));
    }
    events.push(json_event("done", &serde_json::json!({"ok": true})));
    events
}

/// Render `envelope` as a `text/event-stream` response, terminating the
/// stream after the last event — there is no live tail, since the
/// gateway's `?stream` mode re-renders a single already-assembled
/// envelope rather than subscribing to a push source.
#[must_use]
pub fn stream_envelope(envelope: &Envelope) -> Response {
    let events = success_events(envelope);
    let stream: impl Stream<Item = Result<Event, Infallible>> = stream::iter(events.into_iter().map(Ok));
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Render a [`GatewayError`] as a single-event SSE error response,
/// matching `sse_error_event`'s body shape.
#[must_use]
pub fn stream_error(err: &GatewayError) -> Response {
    let event = sse_error_event(err);
    let stream = stream::iter(vec![Ok::<_, Infallible>(event)]);
    Sse::new(stream).into_response()
}
