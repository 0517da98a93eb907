//! ==============================================================================
//! live.rs - websocket live-update channel
//! ==============================================================================
//!
//! purpose:
//!     one task per connected viewer. frames are JSON envelopes
//!     `{"event": <name>, "data": <payload>}`:
//!
//!     client -> server:  ping             (any data)  -> pong {"msg":"pong"}
//!                        update-location  mobile reading, appended + broadcast
//!     server -> client:  history          backlog, once on connect
//!                        new-data         one Reading per append
//!                        pong / error     replies to this client only
//!
//! relationships:
//!     - registered by: server.rs (GET /ws)
//!     - uses: relay.rs (connect/disconnect, ingest for update-location)
//!
//! ==============================================================================

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{Reading, ReadingKind};
use crate::relay::{Relay, Subscription};
use crate::server::AppState;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    History(Vec<Reading>),
    NewData(Reading),
    Pong(Value),
    Error(Value),
}

impl ServerEvent {
    pub fn pong() -> Self {
        Self::Pong(json!({ "msg": "pong" }))
    }

    fn protocol_error(message: String) -> Self {
        Self::Error(json!({ "error": message, "code": "bad_event" }))
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// handle one inbound text frame; returns the reply for this client, if any
pub async fn handle_text(relay: &Relay, text: &str) -> Option<ServerEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => return Some(ServerEvent::protocol_error(format!("unreadable frame: {}", e))),
    };

    match envelope.event.as_str() {
        "ping" => Some(ServerEvent::pong()),
        // the new-data echo reaches this client through its own queue
        "update-location" => match relay.ingest(&envelope.data, ReadingKind::Mobile).await {
            Ok(_) => None,
            Err(e) => Some(ServerEvent::Error(e.to_json())),
        },
        other => Some(ServerEvent::protocol_error(format!("unknown event `{}`", other))),
    }
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state.relay))
}

async fn run_session(mut socket: WebSocket, relay: Relay) {
    let Subscription { id, backlog, mut events } = relay.connect().await;

    if send(&mut socket, &ServerEvent::History(backlog)).await.is_err() {
        relay.disconnect(id);
        return;
    }

    loop {
        tokio::select! {
            queued = events.recv() => {
                match queued {
                    Some(reading) => {
                        if send(&mut socket, &ServerEvent::NewData(reading)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // the broadcaster removed us (queue overflow)
                        tracing::warn!(subscriber = %id, "live queue closed, ending session");
                        break;
                    }
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&relay, &text).await {
                            if send(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary and control frames
                    Some(Err(e)) => {
                        tracing::debug!(subscriber = %id, error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
        }
    }

    relay.disconnect(id);
}

async fn send(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let frame = encode(event).map_err(|e| {
        tracing::error!(error = %e, "failed to encode live event");
        axum::Error::new(e)
    })?;
    socket.send(frame).await
}

fn encode(event: &ServerEvent) -> Result<Message, serde_json::Error> {
    serde_json::to_string(event).map(Message::Text)
}
