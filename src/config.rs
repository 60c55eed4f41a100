//!
//! Server configuration
//! --------------------
//! Defaults, overridden by `XCELIQ_*` environment variables, overridden by CLI
//! flags. The flag helpers are deliberately tiny: each looks for `--flag VALUE`
//! anywhere in the argument list and ignores values that fail to parse.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PROJECT: &str = "xceliq-dev";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 1500;
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub data_dir: PathBuf,
    /// Backend project; selects `<data_dir>/<project>/store.json`.
    pub project: String,
    pub session_ttl_secs: u64,
    pub redirect_delay_ms: u64,
    /// 0 disables the periodic snapshot; the store is still saved on shutdown.
    pub snapshot_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            project: DEFAULT_PROJECT.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    /// Defaults ← process environment ← `args`.
    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::resolve(|name| env::var(name).ok(), args)
    }

    /// Same layering with an injectable environment lookup.
    pub fn resolve<F: Fn(&str) -> Option<String>>(env_lookup: F, args: &[String]) -> Self {
        let d = Self::default();
        let env_num = |name: &str| env_lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let env_port = env_lookup("XCELIQ_HTTP_PORT").and_then(|v| v.trim().parse::<u16>().ok());

        Self {
            http_port: parse_port_arg(args, "--http-port").or(env_port).unwrap_or(d.http_port),
            data_dir: parse_string_arg(args, "--data-dir")
                .or_else(|| env_lookup("XCELIQ_DATA_DIR"))
                .map(PathBuf::from)
                .unwrap_or(d.data_dir),
            project: parse_string_arg(args, "--project")
                .or_else(|| env_lookup("XCELIQ_PROJECT"))
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(d.project),
            session_ttl_secs: parse_u64_arg(args, "--session-ttl-secs")
                .or_else(|| env_num("XCELIQ_SESSION_TTL_SECS"))
                .unwrap_or(d.session_ttl_secs),
            redirect_delay_ms: parse_u64_arg(args, "--redirect-delay-ms")
                .or_else(|| env_num("XCELIQ_REDIRECT_DELAY_MS"))
                .unwrap_or(d.redirect_delay_ms),
            snapshot_interval_secs: parse_u64_arg(args, "--snapshot-interval-secs")
                .or_else(|| env_num("XCELIQ_SNAPSHOT_INTERVAL_SECS"))
                .unwrap_or(d.snapshot_interval_secs),
        }
    }

    pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }

    pub fn redirect_delay(&self) -> Duration { Duration::from_millis(self.redirect_delay_ms) }

    pub fn store_path(&self) -> PathBuf { self.data_dir.join(&self.project).join("store.json") }
}

pub fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    parse_string_arg(args, flag).and_then(|v| v.parse::<u16>().ok())
}

pub fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    parse_string_arg(args, flag).and_then(|v| v.parse::<u64>().ok())
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
