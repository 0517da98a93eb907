//! ==============================================================================
//! viewer - headless dashboard
//! ==============================================================================
//!
//! purpose:
//!     the client side of the relay: keeps a local 500-entry history, derives
//!     the risk assessment and the particle trail from it, and reports the
//!     connection state.
//!
//! feeding:
//!     - poll: one GET /data per tick, each awaited before the next tick is
//!       taken, so fetches never overlap. a failed fetch flips `connected`
//!       to false and the next tick retries.
//!     - push: a websocket subscription (feed.rs) delivering the backlog on
//!       connect and every new reading after it. it reconnects on its own.
//!
//!     the trail is fed only with readings new to the local history, gated
//!     by their own timestamps.
//!
//! relationships:
//!     - history.rs: seq-keyed local ring (poll + push, push wins)
//!     - trail.rs:   particle drop sampler and ttl gc
//!     - feed.rs:    live websocket subscription
//!     - uses: client.rs (GET /data), risk.rs, geo.rs
//!
//! ==============================================================================

pub mod feed;
pub mod history;
pub mod trail;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::client::RelayClient;
use crate::config::RelayConfig;
use crate::domain::Reading;
use crate::error::TransportError;
use crate::geo::map_position;
use crate::risk::{self, AirQualityBand, RiskAssessment, RiskPolicy};

use self::feed::FeedEvent;
use self::history::LocalHistory;
use self::trail::{ParticleTrail, TrailPolicy};

pub struct ViewerState {
    history: LocalHistory,
    trail: ParticleTrail,
    policy: RiskPolicy,
}

impl ViewerState {
    pub fn new(policy: RiskPolicy, trail: &TrailPolicy) -> Self {
        Self {
            history: LocalHistory::default(),
            trail: ParticleTrail::new(trail),
            policy,
        }
    }

    /// a poll completed, or the live feed (re)connected
    pub fn on_snapshot(&mut self, snapshot: Vec<Reading>, now_ms: i64) {
        let fresh = self.history.apply_snapshot(snapshot);
        self.history.set_connected(true);
        for reading in &fresh {
            self.track(reading);
        }
        self.trail.prune(now_ms);
    }

    /// a `new-data` push arrived
    pub fn on_push(&mut self, reading: Reading, now_ms: i64) {
        if self.history.apply_push(reading.clone()) {
            self.track(&reading);
        }
        self.trail.prune(now_ms);
    }

    pub fn on_feed(&mut self, event: FeedEvent, now_ms: i64) {
        match event {
            FeedEvent::Snapshot(readings) => self.on_snapshot(readings, now_ms),
            FeedEvent::Push(reading) => self.on_push(reading, now_ms),
            // polling keeps running; `connected` follows the poll
            FeedEvent::Lost(error) => tracing::debug!(error = %error, "live feed down, retrying"),
        }
    }

    pub fn on_transport_error(&mut self, error: &TransportError) {
        if self.history.is_connected() {
            tracing::warn!(error = %error, "lost connection to relay");
        } else {
            tracing::debug!(error = %error, "relay still unreachable");
        }
        self.history.set_connected(false);
    }

    fn track(&mut self, reading: &Reading) {
        self.trail.record(map_position(reading), reading.pm25, reading.timestamp);
    }

    pub fn assessment(&self) -> RiskAssessment {
        risk::assess(&self.history.readings(), &self.policy)
    }

    pub fn history(&self) -> &LocalHistory {
        &self.history
    }

    pub fn trail(&self) -> &ParticleTrail {
        &self.trail
    }

    pub fn is_connected(&self) -> bool {
        self.history.is_connected()
    }

    fn report(&self) {
        let Some(latest) = self.history.latest() else {
            tracing::info!(connected = self.is_connected(), "no readings yet");
            return;
        };
        let band = AirQualityBand::classify(latest.pm25);
        let risk = self.assessment();
        tracing::info!(
            connected = self.is_connected(),
            samples = self.history.len(),
            pm25 = latest.pm25,
            band = band.label(),
            risk = ?risk.level,
            risk_pct = risk.percentage.round(),
            exposure = %format_args!("{:.1}", risk.cumulative_exposure),
            above_threshold_pct = %format_args!("{:.1}", risk.time_above_threshold),
            trail = self.trail.len(),
            "dashboard"
        );
    }
}

/// poll loop plus live feed; runs until the process stops
pub async fn run_viewer(config: &RelayConfig) -> anyhow::Result<()> {
    let client = RelayClient::new(&config.client.relay_url)?;
    let mut state = ViewerState::new(config.risk.clone(), &config.trail);
    let period = Duration::from_secs(config.client.interval_seconds.max(1));

    let (tx, mut live) = mpsc::channel(256);
    tokio::spawn(feed::run_feed(client.live_url(), period, tx));

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(url = %client.data_url(), live = %client.live_url(), "viewer started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = client.fetch_history().await;
                let now_ms = chrono::Utc::now().timestamp_millis();
                match result {
                    Ok(snapshot) => state.on_snapshot(snapshot, now_ms),
                    Err(e) => state.on_transport_error(&e),
                }
                state.report();
            }
            Some(event) = live.recv() => {
                state.on_feed(event, chrono::Utc::now().timestamp_millis());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingKind;
    use crate::geo::GeoPoint;
    use crate::risk::RiskLevel;

    const T0: i64 = 1_700_000_000_000;

    fn reading(seq: u64, pm25: f64, at: GeoPoint) -> Reading {
        reading_at(seq, pm25, at, T0 + seq as i64 * 1000)
    }

    fn reading_at(seq: u64, pm25: f64, at: GeoPoint, timestamp: i64) -> Reading {
        Reading {
            seq,
            kind: ReadingKind::Mobile,
            node: None,
            pm25,
            pm10: None,
            lat: at.lat,
            lon: at.lon,
            timestamp,
        }
    }

    #[test]
    fn snapshot_and_push_feed_one_history() {
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        let here = GeoPoint::new(45.0, 9.0);
        viewer.on_snapshot(vec![reading(1, 10.0, here), reading(2, 40.0, here)], T0);
        viewer.on_push(reading(3, 40.0, here), T0 + 1_000);
        viewer.on_push(reading(3, 40.0, here), T0 + 1_000);
        viewer.on_snapshot(vec![reading(1, 10.0, here), reading(2, 40.0, here)], T0 + 2_000);
        viewer.on_push(reading(4, 10.0, here), T0 + 3_000);

        assert_eq!(viewer.history().len(), 4);
        let a = viewer.assessment();
        assert_eq!(a.cumulative_exposure, 25.0);
        assert_eq!(a.time_above_threshold, 50.0);
        assert_eq!(a.level, RiskLevel::Moderate);
    }

    #[test]
    fn trail_follows_reading_timestamps_with_throttle() {
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        let start = GeoPoint::new(45.0, 9.0);
        viewer.on_push(reading_at(1, 5.0, start, T0), T0);
        viewer.on_push(reading_at(2, 5.0, start.offset_m(2.0, 0.0), T0 + 3_000), T0 + 3_000);
        assert_eq!(viewer.trail().len(), 1);

        viewer.on_push(reading_at(3, 5.0, start.offset_m(10.0, 0.0), T0 + 6_000), T0 + 6_000);
        assert_eq!(viewer.trail().len(), 2);

        viewer.on_snapshot(Vec::new(), T0 + 200_000);
        assert!(viewer.trail().is_empty());
    }

    #[test]
    fn repeated_polls_do_not_grow_the_trail() {
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        let here = GeoPoint::new(45.0, 9.0);
        let snapshot = vec![reading_at(1, 5.0, here, T0)];

        for poll in 0..5 {
            viewer.on_snapshot(snapshot.clone(), T0 + poll * 10_000);
        }
        assert_eq!(viewer.trail().len(), 1);

        // a reading that moved, stamped 6 s after the first
        let moved = reading_at(2, 5.0, here.offset_m(20.0, 0.0), T0 + 6_000);
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        viewer.on_snapshot(vec![snapshot[0].clone(), moved], T0 + 10_000);
        assert_eq!(viewer.trail().len(), 2);
        let dropped: Vec<i64> = viewer.trail().particles().map(|p| p.dropped_at).collect();
        assert_eq!(dropped, vec![T0, T0 + 6_000]);
    }

    #[test]
    fn live_feed_events_reach_the_history() {
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        let here = GeoPoint::new(45.0, 9.0);
        viewer.on_feed(FeedEvent::Snapshot(vec![reading(1, 10.0, here)]), T0);
        viewer.on_feed(FeedEvent::Push(reading(2, 40.0, here)), T0 + 2_000);
        viewer.on_feed(FeedEvent::Lost(TransportError::LiveClosed), T0 + 3_000);

        assert_eq!(viewer.history().len(), 2);
        assert_eq!(viewer.history().latest().map(|r| r.seq), Some(2));
        assert!(viewer.is_connected());
    }

    #[test]
    fn transport_error_clears_connected_flag() {
        let mut viewer = ViewerState::new(RiskPolicy::default(), &TrailPolicy::default());
        viewer.on_snapshot(Vec::new(), T0);
        assert!(viewer.is_connected());

        let err = TransportError::Status { status: 503, body: "unavailable".into() };
        viewer.on_transport_error(&err);
        assert!(!viewer.is_connected());

        viewer.on_snapshot(Vec::new(), T0 + 5_000);
        assert!(viewer.is_connected());
    }
}
