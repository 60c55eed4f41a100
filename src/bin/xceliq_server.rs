//!
//! xceliq server binary
//! --------------------
//! Command-line entry point for the XcelIQ HTTP API. Configuration comes from
//! CLI flags, then `XCELIQ_*` environment variables, then built-in defaults.

use anyhow::Result;
use std::env;

use xceliq::config::{has_flag, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    println!(r"  _  __         __  ________
 | |/ /_______ / / /  _/ __ \
 |   // __/ -_) / _/ // /_/ /
/_/|_|\__/\__/_/ /___/\___\_\ ");

    // Initialize tracing subscriber with env filter, defaulting to info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("xceliq Server\n\nUSAGE:\n  xceliq_server [--http-port N] [--data-dir PATH] [--project NAME] [--session-ttl-secs N] [--redirect-delay-ms N] [--snapshot-interval-secs N]\n\nOPTIONS:\n  --http-port N                HTTP API port (env: XCELIQ_HTTP_PORT, default 8080)\n  --data-dir PATH              Store root folder (env: XCELIQ_DATA_DIR, default data)\n  --project NAME               Backend project; store file is <data-dir>/<project>/store.json (env: XCELIQ_PROJECT, default xceliq-dev)\n  --session-ttl-secs N         Session lifetime (env: XCELIQ_SESSION_TTL_SECS, default 3600)\n  --redirect-delay-ms N        Route-guard redirect delay (env: XCELIQ_REDIRECT_DELAY_MS, default 1500)\n  --snapshot-interval-secs N   Store snapshot interval, 0 disables (env: XCELIQ_SNAPSHOT_INTERVAL_SECS, default 5)\n");
        return Ok(());
    }

    let cfg = ServerConfig::from_env_and_args(&args);
    println!(
        "xceliq starting: http={}, data_dir={}, project={}",
        cfg.http_port,
        cfg.data_dir.display(),
        cfg.project
    );
    tracing::info!(
        "Using port: http={}, data_dir={}, project={}",
        cfg.http_port,
        cfg.data_dir.display(),
        cfg.project
    );
    xceliq::server::run_with_config(cfg).await
}
