//! Session events streamed to WebSocket clients.
//!
//! Every event is a JSON object with `event` and `payload` fields:
//!
//! - `connected` - sent on connect, carries a session snapshot
//! - `generation_started` - a generation began
//! - `generation_completed` - a generation succeeded and was saved
//! - `generation_failed` - a generation was aborted
//! - `history_cleared` - the history was emptied
//! - `theme_changed` - a different theme was selected

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::model::{GenerationMode, InputKind, Theme};
use crate::session::SessionSnapshot;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPayload {
    /// The session as it is right now.
    pub session: SessionSnapshot,
}

/// Payload for the `generation_started` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStartedPayload {
    /// Requested mode.
    pub mode: GenerationMode,
    /// Text or image input.
    pub input_kind: InputKind,
    /// Whether icons were requested.
    pub generate_icons: bool,
}

/// Payload for the `generation_completed` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCompletedPayload {
    /// Id of the new history record.
    pub record_id: i64,
    /// Mode of the generated items.
    pub mode: GenerationMode,
    /// Number of generated items.
    pub items: usize,
}

/// Payload for the `generation_failed` event.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationFailedPayload {
    /// The user-facing error message.
    pub message: String,
}

/// Payload for the `theme_changed` event.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeChangedPayload {
    /// The newly selected theme.
    pub theme: Theme,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events describing changes to the study session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StudyEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a generation begins.
    GenerationStarted(GenerationStartedPayload),
    /// Sent when a generation succeeds.
    GenerationCompleted(GenerationCompletedPayload),
    /// Sent when a generation fails.
    GenerationFailed(GenerationFailedPayload),
    /// Sent when the history is cleared.
    HistoryCleared,
    /// Sent when the theme changes.
    ThemeChanged(ThemeChangedPayload),
}

impl StudyEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(session: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { session })
    }

    /// Creates a `GenerationStarted` event.
    #[must_use]
    pub const fn generation_started(
        mode: GenerationMode,
        input_kind: InputKind,
        generate_icons: bool,
    ) -> Self {
        Self::GenerationStarted(GenerationStartedPayload {
            mode,
            input_kind,
            generate_icons,
        })
    }

    /// Creates a `GenerationCompleted` event.
    #[must_use]
    pub const fn generation_completed(record_id: i64, mode: GenerationMode, items: usize) -> Self {
        Self::GenerationCompleted(GenerationCompletedPayload {
            record_id,
            mode,
            items,
        })
    }

    /// Creates a `GenerationFailed` event.
    #[must_use]
    pub fn generation_failed(message: impl Into<String>) -> Self {
        Self::GenerationFailed(GenerationFailedPayload {
            message: message.into(),
        })
    }

    /// Creates a `ThemeChanged` event.
    #[must_use]
    pub const fn theme_changed(theme: Theme) -> Self {
        Self::ThemeChanged(ThemeChangedPayload { theme })
    }

    /// Returns the event name as sent on the wire.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::GenerationStarted(_) => "generation_started",
            Self::GenerationCompleted(_) => "generation_completed",
            Self::GenerationFailed(_) => "generation_failed",
            Self::HistoryCleared => "history_cleared",
            Self::ThemeChanged(_) => "theme_changed",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans session events out to every connected client.
///
/// Events are not kept for clients that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StudyEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.sender.subscribe()
    }

    /// Sends an event, returning how many subscribers will receive it.
    pub fn send(&self, event: StudyEvent) -> usize {
        debug!(event = event.event_name(), "Broadcasting event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Upgrades `GET /ws` to a WebSocket event stream.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Sends `connected`, then forwards broadcast events and pings every
/// [`HEARTBEAT_INTERVAL`] until the client leaves or misses
/// [`MAX_MISSED_PONGS`] pongs.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before snapshotting so nothing is missed in between
    let mut events = state.broadcaster.subscribe();
    let snapshot = state.session.lock().await.snapshot();

    let connected = match serde_json::to_string(&StudyEvent::connected(snapshot)) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize connected event");
            return;
        }
    };
    if sender.send(Message::Text(connected)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }
    info!("WebSocket client connected");

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed the stream");
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!("Ignoring message from client");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, event = event.event_name(), "Failed to serialize event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Client lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed_pongs, "Client stopped answering pings, closing");
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::StudySession;
    use crate::storage::MemoryStore;

    #[test]
    fn test_connected_event_serialization() {
        let session = StudySession::new(Arc::new(MemoryStore::new()), GenerationMode::Mcq);
        let json = serde_json::to_string(&StudyEvent::connected(session.snapshot())).unwrap();

        assert!(json.contains(r#""event":"connected""#));
        assert!(json.contains(r#""session""#));
        assert!(json.contains(r#""mode":"mcq""#));
    }

    #[test]
    fn test_generation_events_serialization() {
        let json = serde_json::to_string(&StudyEvent::generation_started(
            GenerationMode::Flashcards,
            InputKind::Image,
            true,
        ))
        .unwrap();
        assert!(json.contains(r#""event":"generation_started""#));
        assert!(json.contains(r#""inputKind":"image""#));
        assert!(json.contains(r#""generateIcons":true"#));

        let json = serde_json::to_string(&StudyEvent::generation_completed(
            1_700_000_000_000,
            GenerationMode::Mcq,
            5,
        ))
        .unwrap();
        assert!(json.contains(r#""recordId":1700000000000"#));
        assert!(json.contains(r#""items":5"#));

        let json =
            serde_json::to_string(&StudyEvent::generation_failed("Failed to generate content."))
                .unwrap();
        assert!(json.contains(r#""message":"Failed to generate content.""#));
    }

    #[test]
    fn test_history_cleared_has_no_payload() {
        let json = serde_json::to_string(&StudyEvent::HistoryCleared).unwrap();
        assert_eq!(json, r#"{"event":"history_cleared"}"#);
    }

    #[test]
    fn test_theme_changed_serialization() {
        let json = serde_json::to_string(&StudyEvent::theme_changed(Theme::Dark)).unwrap();
        assert_eq!(json, r#"{"event":"theme_changed","payload":{"theme":"dark"}}"#);
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let events = [
            StudyEvent::generation_started(GenerationMode::Mcq, InputKind::Text, false),
            StudyEvent::generation_completed(1, GenerationMode::Mcq, 1),
            StudyEvent::generation_failed("x"),
            StudyEvent::HistoryCleared,
            StudyEvent::theme_changed(Theme::Ocean),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.event_name());
        }
    }

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new(10);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.send(StudyEvent::HistoryCleared), 2);

        assert_eq!(first.recv().await.unwrap().event_name(), "history_cleared");
        assert_eq!(second.recv().await.unwrap().event_name(), "history_cleared");
    }

    #[test]
    fn test_broadcaster_without_subscribers() {
        let broadcaster = EventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        assert_eq!(broadcaster.send(StudyEvent::HistoryCleared), 0);
    }
}
