//! WebSocket push feed.
//!
//! Connects to the backend's event socket and republishes every decoded
//! frame into an [`EventHub`]. The feed never reconnects on its own: when the
//! socket closes the task ends and the board simply stops receiving pushes.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use board_core::{BoardError, Result};

use crate::events::{EventHub, PushEvent};

/// Handle to the background feed task.
pub struct FeedHandle {
    handle: JoinHandle<()>,
}

impl FeedHandle {
    /// Stop reading from the socket.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Open the event socket at `url` and start forwarding into `hub`.
pub async fn connect(url: &str, hub: Arc<EventHub>) -> Result<FeedHandle> {
    let parsed = url::Url::parse(url)
        .map_err(|e| BoardError::Config(format!("invalid events URL {url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(BoardError::Config(format!(
            "events URL must be ws or wss, got {url:?}"
        )));
    }

    let (mut stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| BoardError::Subscription(format!("failed to connect to {url}: {e}")))?;
    tracing::info!(%url, "push feed connected");

    let handle = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    forward_frame(&hub, &text);
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "push feed closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "push feed read failed; stopping");
                    break;
                }
            }
        }
        tracing::debug!("push feed task finished");
    });

    Ok(FeedHandle { handle })
}

/// Decode one text frame and publish it.
///
/// Malformed frames are logged and dropped. Returns the number of handlers
/// the event reached.
pub fn forward_frame(hub: &EventHub, text: &str) -> usize {
    match PushEvent::decode_frame(text) {
        Ok(Some(event)) => {
            tracing::trace!(event = event.kind().wire_name(), machine_id = %event.machine_id(), "push event");
            hub.publish(&event)
        }
        Ok(None) => {
            tracing::debug!("ignoring push frame for unconsumed event");
            0
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed push frame");
            0
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, PushChannel, SubscriberId};
    use board_core::models::MachineId;
    use parking_lot::Mutex;

    fn recording_hub() -> (Arc<EventHub>, Arc<Mutex<Vec<PushEvent>>>) {
        let hub = Arc::new(EventHub::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = SubscriberId::next();
        for kind in EventKind::ALL {
            let seen = Arc::clone(&seen);
            hub.subscribe(
                kind,
                sub,
                Arc::new(move |e: &PushEvent| seen.lock().push(e.clone())),
            )
            .unwrap();
        }
        (hub, seen)
    }

    #[test]
    fn test_forward_frame_publishes() {
        let (hub, seen) = recording_hub();
        let n = forward_frame(&hub, r#"{"event":"stoppage-added","data":{"machineId":12}}"#);
        assert_eq!(n, 1);
        assert_eq!(
            seen.lock().as_slice(),
            &[PushEvent::StoppageAdded { machine_id: MachineId(12) }]
        );
    }

    #[test]
    fn test_forward_frame_drops_garbage() {
        let (hub, seen) = recording_hub();
        assert_eq!(forward_frame(&hub, "{"), 0);
        assert_eq!(forward_frame(&hub, r#"{"event":"pin-data","data":{}}"#), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_non_ws_url() {
        let hub = Arc::new(EventHub::new());
        let err = connect("http://localhost:3001/events", hub).await.err().unwrap();
        assert!(matches!(err, BoardError::Config(_)));
    }
}
