//! x402 Facilitator HTTP entrypoint.
//!
//! Exposes `/verify`, `/settle`, and `/supported` over HTTP for whichever
//! `eip155:*` / `solana:*` / `starknet:*` networks are configured in the
//! environment (spec §6).

mod chain;
mod config;
mod run;
mod sig_down;

use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run::run().await {
        tracing::error!("facilitator exited with error: {err}");
        std::process::exit(1);
    }
}
