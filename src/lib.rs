//! air-quality telemetry relay
//!
//! sensor nodes and mobile trackers submit pm2.5/pm10 readings; the relay
//! keeps a bounded history and fans every accepted reading out to live
//! dashboard connections.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod history;
pub mod ingest;
pub mod live;
pub mod producer;
pub mod relay;
pub mod risk;
pub mod server;
pub mod viewer;
