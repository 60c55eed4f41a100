use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::data::colleges::{self, CollegeInput, CollegePatch};
use crate::data::users;
use crate::error::AppResult;
use crate::identity::{require_college_scope, Role};

use super::context::RequestContext;
use super::{ok_empty, ok_with, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct StudentFilter {
    pub branch: Option<String>,
    pub year: Option<String>,
}

pub async fn list(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    ok_with("colleges", colleges::list(&app.store))
}

pub async fn create(State(app): State<AppState>, ctx: RequestContext, Json(input): Json<CollegeInput>) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("college", colleges::create(&app.store, &input, None)?)
}

pub async fn get_one(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    let me = ctx.any_of(&[Role::Admin, Role::College])?;
    require_college_scope(me, &id)?;
    ok_with("college", colleges::get(&app.store, &id)?)
}

pub async fn update(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(patch): Json<CollegePatch>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("college", colleges::update(&app.store, &id, &patch)?)
}

pub async fn remove(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    colleges::delete(&app.store, &id)?;
    Ok(ok_empty())
}

pub async fn assign_game(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path((id, game_id)): Path<(String, String)>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("college", colleges::assign_game(&app.store, &id, &game_id)?)
}

pub async fn unassign_game(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path((id, game_id)): Path<(String, String)>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("college", colleges::unassign_game(&app.store, &id, &game_id)?)
}

pub async fn students(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(f): Query<StudentFilter>,
) -> AppResult<Json<JsonValue>> {
    let me = ctx.any_of(&[Role::Admin, Role::College])?;
    require_college_scope(me, &id)?;
    colleges::get(&app.store, &id)?;
    ok_with("students", users::students_of_college(&app.store, &id, f.branch.as_deref(), f.year.as_deref()))
}
