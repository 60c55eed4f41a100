use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::data::users::{self, NewUser, Registration, UserPatch};
use crate::error::{AppError, AppResult};
use crate::identity::Role;

use super::context::RequestContext;
use super::{ok_empty, ok_with, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub role: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordPayload {
    pub password: String,
}

/// Public student self-registration; no session exists yet, so no CSRF check.
pub async fn register(State(app): State<AppState>, Json(reg): Json<Registration>) -> AppResult<Json<JsonValue>> {
    let row = users::register_student(&app.store, app.idp.as_ref(), &reg)?;
    ok_with("user", row)
}

pub async fn list(State(app): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    let role = match p.role.as_deref().filter(|r| !r.is_empty()) {
        Some(r) => Some(r.parse::<Role>().map_err(|e| AppError::user("invalid_role", e))?),
        None => None,
    };
    ok_with("users", users::list(&app.store, role, p.offset, p.limit))
}

pub async fn create(State(app): State<AppState>, ctx: RequestContext, Json(input): Json<NewUser>) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("user", users::create_user(&app.store, app.idp.as_ref(), &input)?)
}

pub async fn get_one(State(app): State<AppState>, ctx: RequestContext, Path(uid): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    ok_with("user", users::get(&app.store, &uid)?)
}

pub async fn update(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(uid): Path<String>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("user", users::update(&app.store, app.idp.as_ref(), &uid, &patch)?)
}

pub async fn remove(State(app): State<AppState>, ctx: RequestContext, Path(uid): Path<String>) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Admin)?;
    if me.uid == uid {
        return Err(AppError::conflict("self_delete", "you cannot delete your own account"));
    }
    let role = users::delete(&app.store, app.idp.as_ref(), &uid)?;
    app.sessions.revoke_user(&uid);
    ok_with("role", role)
}

/// Admins may reset anyone; a college account only its own students.
pub async fn reset_password(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(uid): Path<String>,
    Json(body): Json<PasswordPayload>,
) -> AppResult<Json<JsonValue>> {
    ctx.csrf()?;
    let me = ctx.any_of(&[Role::Admin, Role::College])?;
    if me.role == Role::College {
        let own = users::student_college(&app.store, &uid)?;
        if own.is_none() || own != me.college_id {
            return Err(AppError::forbidden("college_scope", "you can only reset passwords of your own students"));
        }
    }
    users::reset_password(&app.store, app.idp.as_ref(), &uid, &body.password)?;
    app.sessions.revoke_user(&uid);
    Ok(ok_empty())
}
