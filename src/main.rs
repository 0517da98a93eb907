//! ==============================================================================
//! main.rs - air-quality relay entry point
//! ==============================================================================
//!
//! purpose:
//!     one binary, four roles (config `client.role` or env RELAY_ROLE):
//!
//!     - relay:  http + websocket relay with bounded history (default)
//!     - node:   simulated fixed esp32 node posting to a relay
//!     - mobile: simulated phone tracker posting kind:"mobile" readings
//!     - viewer: headless dashboard polling and subscribing to a relay
//!
//! architecture:
//!
//!     ┌────────────┐  POST /data          ┌──────────────────────────────┐
//!     │ node       │ ───────────────────► │            relay              │
//!     │ mobile     │  update-location     │  ingest ─► history (1000)     │
//!     └────────────┘ ───────────────────► │              │                │
//!                                         │              ▼                │
//!     ┌────────────┐  GET /data (poll)    │  broadcaster ─► registry      │
//!     │ viewer /   │ ◄─────────────────── │              │                │
//!     │ dashboard  │  new-data (push)     │              ▼                │
//!     └────────────┘ ◄─────────────────── │  per-subscriber queues       │
//!                                         └──────────────────────────────┘
//!
//! relationships:
//!     - config.rs: relay.toml + env overrides
//!     - relay.rs / server.rs / live.rs: the relay role
//!     - producer.rs: node and mobile roles
//!     - viewer/: viewer role
//!
//! ==============================================================================

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use airq_relay::config::{RelayConfig, Role};
use airq_relay::relay::Relay;
use airq_relay::{producer, server, viewer};

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Air Quality Relay");
    println!("  \"Ingest once, fan out to every dashboard\"");
    println!("===========================================================");

    // step 1: load configuration
    let config = RelayConfig::load_or_default();

    // step 2: logging (RUST_LOG wins over the configured level)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    config.print_summary();

    // step 3: run the selected role
    match config.client.role {
        Role::Relay => {
            let relay = Relay::new(config.history.capacity, config.live.subscriber_queue)
                .with_reading_log(config.logging.show_readings);
            server::run_server(&config, relay).await?;
        }
        Role::Node => producer::run_node(&config).await?,
        Role::Mobile => {
            // a lost fix ends the session, not the process
            if let Err(e) = producer::run_mobile(&config).await {
                tracing::error!(error = %e, "mobile tracking ended");
            }
        }
        Role::Viewer => viewer::run_viewer(&config).await?,
    }

    Ok(())
}
