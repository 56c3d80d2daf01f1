//! Server-Sent Events support
//!
//! Each client holds one stream: an `init` snapshot followed by every
//! session event. When the stream is dropped (the browser went away) the
//! session is released after a grace period, unless a reconnect or another
//! client is watching it by then.

use super::types::SessionSnapshot;
use crate::runtime::SessionManager;
use crate::session::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{BoxStream, Stream};
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Releases the session some time after the owning stream is dropped
pub struct DisconnectGuard {
    sessions: Arc<SessionManager>,
    session_id: String,
}

impl DisconnectGuard {
    pub fn new(sessions: Arc<SessionManager>, session_id: impl Into<String>) -> Self {
        Self {
            sessions,
            session_id: session_id.into(),
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        let session_id = std::mem::take(&mut self.session_id);
        handle.spawn(async move {
            tokio::time::sleep(sessions.disconnect_grace()).await;
            sessions.release_if_unobserved(&session_id).await;
        });
    }
}

/// Event stream that owns its disconnect guard.
///
/// Field order matters: `inner` (and the broadcast receiver inside it) is
/// dropped before `_guard` runs, so the subscriber count is already
/// decremented when the release check happens.
struct GuardedStream {
    inner: BoxStream<'static, Result<Event, Infallible>>,
    _guard: DisconnectGuard,
}

impl Stream for GuardedStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
    guard: DisconnectGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = tokio_stream::once(Ok(init_event(&init)));

    let broadcasts = BroadcastStream::new(broadcast_rx).map(|result| match result {
        Ok(event) => Ok(session_event_to_axum(&event)),
        // The client missed events; it refetches the snapshot on `resync`
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged");
            Ok(Event::default().event("resync").data(json!({ "type": "resync" }).to_string()))
        }
    });

    let stream = GuardedStream {
        inner: Box::pin(init.chain(broadcasts)),
        _guard: guard,
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "session": snapshot,
    });
    Event::default().event("init").data(data.to_string())
}

fn session_event_to_axum(event: &SessionEvent) -> Event {
    let data = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    Event::default().event(event.name()).data(data.to_string())
}
