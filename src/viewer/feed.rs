//! live feed: the viewer's websocket subscription to the relay
//!
//! connects to `/ws`, turns `history` frames into snapshots and `new-data`
//! frames into pushes, and hands them to the viewer loop over a channel. a
//! dropped connection is reported as `FeedEvent::Lost` and retried after
//! `retry`. the task ends once the viewer loop stops listening.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::domain::Reading;
use crate::error::TransportError;
use crate::live::ServerEvent;

#[derive(Debug)]
pub enum FeedEvent {
    Snapshot(Vec<Reading>),
    Push(Reading),
    Lost(TransportError),
}

pub async fn run_feed(url: String, retry: Duration, tx: mpsc::Sender<FeedEvent>) {
    loop {
        let lost = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(url = %url, "live feed connected");
                pump(stream, &tx).await
            }
            Err(e) => TransportError::from(e),
        };
        if tx.send(FeedEvent::Lost(lost)).await.is_err() {
            return;
        }
        tokio::time::sleep(retry).await;
    }
}

/// forward frames until the socket ends; returns why it ended
async fn pump<S>(mut stream: S, tx: &mpsc::Sender<FeedEvent>) -> TransportError
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return e.into(),
        };
        let Some(event) = decode(&text) else {
            continue;
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
    TransportError::LiveClosed
}

/// map one text frame to a feed event; pongs and unreadable frames yield none
pub fn decode(text: &str) -> Option<FeedEvent> {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(ServerEvent::History(readings)) => Some(FeedEvent::Snapshot(readings)),
        Ok(ServerEvent::NewData(reading)) => Some(FeedEvent::Push(reading)),
        Ok(ServerEvent::Error(body)) => {
            tracing::warn!(%body, "relay reported an error");
            None
        }
        Ok(ServerEvent::Pong(_)) => None,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unreadable live frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RelayClient;
    use crate::relay::Relay;
    use crate::server::spawn_local;
    use serde_json::json;

    #[test]
    fn frames_map_to_feed_events() {
        let history = r#"{"event":"history","data":[]}"#;
        assert!(matches!(decode(history), Some(FeedEvent::Snapshot(r)) if r.is_empty()));

        let pushed = r#"{"event":"new-data","data":{"seq":7,"kind":"mobile","pm25":3.5,"lat":45.0,"lon":9.0,"timestamp":1700000000000}}"#;
        match decode(pushed) {
            Some(FeedEvent::Push(r)) => {
                assert_eq!(r.seq, 7);
                assert_eq!(r.pm10, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(decode(r#"{"event":"pong","data":{"msg":"pong"}}"#).is_none());
        assert!(decode("not json").is_none());
    }

    async fn next(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("feed event in time")
            .expect("feed channel open")
    }

    #[tokio::test]
    async fn feed_delivers_backlog_then_pushes() {
        let relay = Relay::new(10, 8);
        let addr = spawn_local(relay.clone()).await;
        let client = RelayClient::new(&format!("http://{}", addr)).unwrap();
        client.submit(&json!({"pm25": 5, "pm10": 9, "lat": 45.46, "lon": 9.19})).await.unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(run_feed(client.live_url(), Duration::from_millis(50), tx));

        match next(&mut rx).await {
            FeedEvent::Snapshot(readings) => assert_eq!(readings.len(), 1),
            other => panic!("expected snapshot, got {:?}", other),
        }

        client.submit(&json!({"pm25": 40, "pm10": 60, "lat": 45.47, "lon": 9.18})).await.unwrap();
        match next(&mut rx).await {
            FeedEvent::Push(reading) => {
                assert_eq!(reading.seq, 2);
                assert_eq!(reading.pm25, 40.0);
            }
            other => panic!("expected push, got {:?}", other),
        }

        drop(rx);
        task.abort();
    }
}
