use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{LoginRequest, Role, SessionState};

use super::context::RequestContext;
use super::{clear_session_cookie, ok_empty, ok_with, set_session_cookie, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Sign in, resolve the role and open a session. An identity without any profile
/// document cannot use the app, so no session is issued for it.
pub async fn login(State(app): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<(HeaderMap, Json<JsonValue>)> {
    let identity = app.idp.sign_in(&LoginRequest { email: payload.email, password: payload.password, ip: None })?;
    let user = match app.resolver.resolve(Some(&identity)) {
        SessionState::Authenticated { user } => user,
        _ => {
            warn!(target: "xceliq::identity", uid = %identity.uid, "sign-in without a profile");
            return Err(AppError::forbidden("no_profile", "this account has no role assigned"));
        }
    };
    let sess = app.sessions.issue(identity)?;
    info!(target: "xceliq::identity", uid = %user.uid, role = %user.role, "signed in");

    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_session_cookie(&sess.token, app.sessions.ttl.as_secs())?);
    let Json(mut body) = ok_with("user", &user)?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("csrfToken".into(), JsonValue::String(sess.csrf_token));
        obj.insert("redirect".into(), JsonValue::String(user.role.home_route().into()));
    }
    Ok((headers, Json(body)))
}

pub async fn logout(State(app): State<AppState>, ctx: RequestContext) -> AppResult<(HeaderMap, Json<JsonValue>)> {
    ctx.csrf()?;
    if let Some(sess) = &ctx.session {
        app.sessions.logout(&sess.token);
        info!(target: "xceliq::identity", uid = %sess.identity.uid, "signed out");
    }
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", clear_session_cookie());
    Ok((headers, ok_empty()))
}

/// Current session state; anonymous callers get `{"state":"anonymous"}` rather than 401.
pub async fn session(ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    ok_with("session", &ctx.state)
}

pub async fn csrf(ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    match &ctx.session {
        Some(sess) => ok_with("csrfToken", &sess.csrf_token),
        None => Err(AppError::auth("no_session", "sign in to continue")),
    }
}

/// Route-guard decision for a dashboard page requiring `role`.
pub async fn guard(State(app): State<AppState>, ctx: RequestContext, Path(role): Path<String>) -> AppResult<Json<JsonValue>> {
    let role: Role = role
        .parse()
        .map_err(|_| AppError::user("invalid_role", format!("unknown role '{}'", role)))?;
    ok_with("guard", app.guard.check(&ctx.state, role))
}
