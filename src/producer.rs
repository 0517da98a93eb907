//! ==============================================================================
//! producer.rs - simulated sensor node and mobile gps tracker
//! ==============================================================================
//!
//! purpose:
//!     stand-ins for the esp32 node and the phone tracker so a relay can be
//!     demoed without hardware. both push to the relay over http.
//!
//!     - node:   fixed position, POST /data with the full node schema
//!     - mobile: walks a 150 m loop around the start coordinate, POST /data
//!               with kind:"mobile" and an epoch-seconds timestamp
//!
//! readings follow a deterministic wave so runs are reproducible.
//!
//! ==============================================================================

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;

use crate::client::RelayClient;
use crate::config::RelayConfig;
use crate::error::TrackerError;
use crate::geo::GeoPoint;

const LOOP_RADIUS_M: f64 = 150.0;

/// synthetic pm2.5/pm10 pair for tick `n`, one decimal
pub fn synthetic_levels(n: u64) -> (f64, f64) {
    let t = n as f64;
    let pm25 = 18.0 + 14.0 * (t * 0.15).sin() + 6.0 * (t * 0.9).sin();
    let pm25 = (pm25.max(0.5) * 10.0).round() / 10.0;
    let pm10 = ((pm25 * 1.6 + 4.0) * 10.0).round() / 10.0;
    (pm25, pm10)
}

pub fn node_payload(node_id: &str, position: GeoPoint, n: u64, now_ms: i64) -> Value {
    let (pm25, pm10) = synthetic_levels(n);
    json!({
        "node": node_id,
        "pm25": pm25,
        "pm10": pm10,
        "lat": position.lat,
        "lon": position.lon,
        "timestamp": now_ms,
    })
}

pub fn mobile_payload(device_id: &str, position: GeoPoint, n: u64, now_ms: i64) -> Value {
    let (pm25, _) = synthetic_levels(n);
    json!({
        "kind": "mobile",
        "node": device_id,
        "pm25": pm25,
        "lat": position.lat,
        "lon": position.lon,
        "timestamp": now_ms / 1000,
    })
}

/// simulated fix for tick `n`; fails like a phone without a usable gps signal
pub fn tracker_position(start: GeoPoint, n: u64) -> Result<GeoPoint, TrackerError> {
    let valid = start.lat.is_finite()
        && start.lon.is_finite()
        && (-90.0..=90.0).contains(&start.lat)
        && (-180.0..=180.0).contains(&start.lon);
    if !valid {
        return Err(TrackerError::Geolocation(format!(
            "no fix available near ({}, {})",
            start.lat, start.lon
        )));
    }
    let theta = n as f64 * 0.05;
    Ok(start.offset_m(LOOP_RADIUS_M * theta.cos(), LOOP_RADIUS_M * theta.sin()))
}

fn ticker(config: &RelayConfig) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.client.interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// fixed node loop; runs until the process stops
pub async fn run_node(config: &RelayConfig) -> anyhow::Result<()> {
    let client = RelayClient::new(&config.client.relay_url)?;
    let position = GeoPoint::new(config.client.start_lat, config.client.start_lon);
    let mut ticker = ticker(config);
    tracing::info!(node = %config.client.node_id, url = %client.data_url(), "simulated node started");

    for n in 0u64.. {
        ticker.tick().await;
        let body = node_payload(&config.client.node_id, position, n, chrono::Utc::now().timestamp_millis());
        match client.submit(&body).await {
            Ok(()) if config.logging.show_readings => {
                tracing::info!(pm25 = %body["pm25"], pm10 = %body["pm10"], "reading posted")
            }
            Ok(()) => tracing::debug!("reading posted"),
            Err(e) => tracing::warn!(error = %e, "post failed, retrying next tick"),
        }
    }
    Ok(())
}

/// mobile tracking session; ends with Geolocation when no fix can be obtained
pub async fn run_mobile(config: &RelayConfig) -> Result<(), TrackerError> {
    let client = RelayClient::new(&config.client.relay_url)?;
    let start = GeoPoint::new(config.client.start_lat, config.client.start_lon);
    let mut ticker = ticker(config);
    tracing::info!(device = %config.client.node_id, "mobile tracking started");

    for n in 0u64.. {
        ticker.tick().await;
        let position = tracker_position(start, n)?;
        let body = mobile_payload(&config.client.node_id, position, n, chrono::Utc::now().timestamp_millis());
        match client.submit(&body).await {
            Ok(()) => tracing::debug!(lat = position.lat, lon = position.lon, "location posted"),
            Err(e) => tracing::warn!(error = %e, "location update failed, retrying next tick"),
        }
    }
    Ok(())
}
