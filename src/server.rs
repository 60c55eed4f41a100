//!
//! XcelIQ HTTP server
//! ------------------
//! Axum-based JSON API for the assessment platform.
//!
//! Responsibilities:
//! - Cookie session + CSRF token model (token issued at login, echoed back in
//!   `x-csrf-token` on every mutating request).
//! - Per-request role resolution from the profile collections and role gating.
//! - Route handlers for administration, college and student dashboards.
//! - Periodic snapshot of the document store and a final save on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{IdentityProvider, LocalIdentityProvider, RoleResolver, RouteGuard, SessionManager};
use crate::store::SharedStore;

pub mod assessments;
pub mod auth;
pub mod colleges;
pub mod context;
pub mod games;
pub mod reports;
pub mod student;
pub mod users;

pub const SESSION_COOKIE: &str = "xceliq_session";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub idp: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionManager>,
    pub resolver: RoleResolver,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn new(store: SharedStore, idp: Arc<dyn IdentityProvider>, sessions: SessionManager, guard: RouteGuard) -> Self {
        Self { resolver: RoleResolver::new(store.clone()), store, idp, sessions: Arc::new(sessions), guard }
    }

    /// State wired with the local identity provider and the configured timings.
    pub fn from_config(store: SharedStore, cfg: &ServerConfig) -> Self {
        let idp: Arc<dyn IdentityProvider> = Arc::new(LocalIdentityProvider::new(store.clone()));
        Self::new(store, idp, SessionManager::new(cfg.session_ttl()), RouteGuard::new(cfg.redirect_delay()))
    }
}

/// All HTTP routes; split out from [`run_with_config`] so tests can drive it directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "xceliq ok" }))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/csrf", get(auth::csrf))
        .route("/api/guard/{role}", get(auth::guard))
        .route("/api/register", post(users::register))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/{uid}", get(users::get_one).put(users::update).delete(users::remove))
        .route("/api/users/{uid}/reset-password", post(users::reset_password))
        .route("/api/colleges", get(colleges::list).post(colleges::create))
        .route("/api/colleges/{id}", get(colleges::get_one).put(colleges::update).delete(colleges::remove))
        .route("/api/colleges/{id}/games/{game_id}", post(colleges::assign_game).delete(colleges::unassign_game))
        .route("/api/colleges/{id}/students", get(colleges::students))
        .route("/api/games", get(games::list))
        .route("/api/games/{id}", get(games::get_one).put(games::update))
        .route("/api/games/{id}/leaderboard", get(games::leaderboard))
        .route("/api/assessments", get(assessments::list).post(assessments::create))
        .route("/api/assessments/{id}", get(assessments::get_one).put(assessments::update).delete(assessments::remove))
        .route(
            "/api/assessments/{id}/colleges/{college_id}",
            post(assessments::assign).delete(assessments::unassign),
        )
        .route("/api/college/assessments", get(assessments::for_college))
        .route("/api/student/assessments", get(student::assessments))
        .route("/api/student/games/{game_id}/plays", post(student::record_play))
        .route("/api/student/stats", get(student::stats))
        .route("/api/student/assessments/{id}/attempt", post(student::start_attempt))
        .route("/api/student/assessments/{id}/attempt/games/{game_id}", post(student::record_attempt_score))
        .route("/api/student/assessments/{id}/attempt/submit", post(student::submit_attempt))
        .route("/api/reports/overview", get(reports::overview))
        .route("/api/reports/colleges/{id}", get(reports::college))
        .route("/api/reports/assessments/{id}", get(reports::assessment))
        .with_state(state)
}

fn log_startup(cfg: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "xceliq starting: cwd={:?}, data_dir={:?}, project={}, store={:?}, session_ttl_secs={}, redirect_delay_ms={}, snapshot_interval_secs={}",
        cwd,
        cfg.data_dir,
        cfg.project,
        cfg.store_path(),
        cfg.session_ttl_secs,
        cfg.redirect_delay_ms,
        cfg.snapshot_interval_secs
    );
}

/// Start the HTTP server. Opens (or creates) the project's store, mounts every
/// route and snapshots the store until shutdown.
pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    log_startup(&cfg);

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("Failed to create or access data dir: {}", cfg.data_dir.display()))?;
    let store = SharedStore::open(&cfg.data_dir, &cfg.project)
        .with_context(|| format!("While opening store for project '{}' under {}", cfg.project, cfg.data_dir.display()))?;

    if store.count(crate::store::Collection::Admins, &crate::store::Query::all()) == 0 {
        warn!(target: "startup", "no admin accounts exist; create one with xceliq_bootstrap");
    }

    let state = AppState::from_config(store.clone(), &cfg);
    let snapshots = cfg.snapshot_interval_secs > 0;
    if !snapshots {
        info!(target: "startup", "periodic snapshots disabled");
    }
    let every = if snapshots { Duration::from_secs(cfg.snapshot_interval_secs) } else { SWEEP_INTERVAL };
    spawn_maintenance_loop(store.clone(), state.sessions.clone(), every, snapshots);

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    store.persist().context("While saving store on shutdown")?;
    info!(target: "startup", "store saved, bye");
    Ok(())
}

/// Convenience entry point using defaults and the process environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::from_env_and_args(&[])).await
}

/// Session sweep cadence when periodic snapshots are disabled.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One background pass: drop expired sessions, then save the store if it changed.
fn maintenance_tick(store: &SharedStore, sessions: &SessionManager, persist: bool) {
    let swept = sessions.sweep_expired();
    if swept > 0 {
        tracing::debug!(target: "xceliq::identity", swept, "expired sessions removed");
    }
    if !persist {
        return;
    }
    match store.persist_if_dirty() {
        Ok(true) => tracing::debug!(target: "xceliq::store", "snapshot written"),
        Ok(false) => {}
        Err(e) => error!(target: "xceliq::store", "snapshot failed: {}", e),
    }
}

fn spawn_maintenance_loop(store: SharedStore, sessions: Arc<SessionManager>, every: Duration, persist: bool) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            maintenance_tick(&store, &sessions, persist);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

pub(crate) fn set_session_cookie(token: &str, max_age_secs: u64) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token, max_age_secs
    ))
    .map_err(|e| AppError::internal("cookie_encode", e.to_string()))
}

pub(crate) fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "xceliq_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
    )
}

/// `{"status":"ok"}`
pub(crate) fn ok_empty() -> Json<JsonValue> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `{"status":"ok", "<key>": value}`
pub(crate) fn ok_with<T: Serialize>(key: &str, value: T) -> AppResult<Json<JsonValue>> {
    let v = serde_json::to_value(value).map_err(|e| AppError::internal("response_encode", e.to_string()))?;
    let mut body = Map::new();
    body.insert("status".into(), JsonValue::String("ok".into()));
    body.insert(key.to_string(), v);
    Ok(Json(JsonValue::Object(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_picks_named_value() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("a=1; xceliq_session=tok-123; b=2"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("tok-123"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn ok_body_shape() {
        let Json(v) = ok_with("count", 3).unwrap();
        assert_eq!(v, serde_json::json!({"status": "ok", "count": 3}));
        assert_eq!(ok_empty().0, serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn maintenance_tick_sweeps_sessions_and_saves() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SharedStore::open(tmp.path(), "proj").unwrap();
        let sessions = SessionManager::new(Duration::from_millis(0));
        let ident = crate::identity::Identity { uid: "u1".into(), email: "u1@x.io".into(), display_name: String::new() };
        sessions.issue(ident).unwrap();
        store.set(crate::store::Collection::Users, "u1", serde_json::Map::new());

        maintenance_tick(&store, &sessions, false);
        assert_eq!(sessions.active_count(), 0);
        assert!(store.is_dirty());

        maintenance_tick(&store, &sessions, true);
        assert!(!store.is_dirty());
    }
}
