use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::Value as JsonValue;

use crate::data::reports;
use crate::error::AppResult;
use crate::identity::{require_college_scope, Role};

use super::context::RequestContext;
use super::{ok_with, AppState};

pub async fn overview(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    ok_with("overview", reports::overview(&app.store, Utc::now()))
}

pub async fn college(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    let me = ctx.any_of(&[Role::Admin, Role::College])?;
    require_college_scope(me, &id)?;
    ok_with("report", reports::college_report(&app.store, &id, Utc::now())?)
}

pub async fn assessment(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    ok_with("report", reports::assessment_report(&app.store, &id, Utc::now())?)
}
