//! Callback Relay
//!
//! Accepts notification status callbacks over HTTP and delivers them to
//! client-supplied HTTPS endpoints with a recovered bearer credential.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /callback/send
//!     ─────────────────────▶ http (intake, 202) ──spawn──▶ dispatch
//!                                                            │
//!                              crypto (KeyRing | Legacy) ◀───┤
//!                                                            │
//!                              resilience (classify/backoff) ◀┤
//!                                                            ▼
//!                                             transport (pooled reqwest) ──▶ client endpoint
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;

use callback_relay::config::load_config;
use callback_relay::lifecycle::{wait_for_signal, Relay};
use callback_relay::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "callback-relay")]
#[command(about = "Authenticated, retrying callback delivery", long_about = None)]
struct Args {
    /// TOML configuration file; defaults and environment variables apply without one
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };
    init_tracing(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_attempts = config.retries.max_attempts,
        request_timeout_secs = config.transport.request_timeout_secs,
        "callback-relay starting"
    );

    let relay = Relay::build(config)?;
    relay.run(wait_for_signal()).await?;
    Ok(())
}
