use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::data::assessments::{self, AssessmentInput, AssessmentPatch, AssessmentRow};
use crate::error::{AppError, AppResult};
use crate::identity::Role;

use super::context::RequestContext;
use super::{ok_empty, ok_with, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn list(State(app): State<AppState>, ctx: RequestContext, Query(p): Query<SearchParams>) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    let now = Utc::now();
    let rows = match p.q.as_deref() {
        Some(term) => assessments::search(&app.store, term, now),
        None => assessments::list(&app.store, now),
    };
    ok_with("assessments", rows)
}

pub async fn create(State(app): State<AppState>, ctx: RequestContext, Json(input): Json<AssessmentInput>) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Admin)?;
    let created = assessments::create(&app.store, &input, Some(&me.uid))?;
    ok_with("assessment", AssessmentRow::from_stored(created, Utc::now()))
}

pub async fn get_one(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.role(Role::Admin)?;
    ok_with("assessment", AssessmentRow::from_stored(assessments::get(&app.store, &id)?, Utc::now()))
}

pub async fn update(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(patch): Json<AssessmentPatch>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("assessment", AssessmentRow::from_stored(assessments::update(&app.store, &id, &patch)?, Utc::now()))
}

pub async fn remove(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    assessments::delete(&app.store, &id)?;
    Ok(ok_empty())
}

pub async fn assign(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path((id, college_id)): Path<(String, String)>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("assessment", AssessmentRow::from_stored(assessments::assign(&app.store, &id, &college_id)?, Utc::now()))
}

pub async fn unassign(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path((id, college_id)): Path<(String, String)>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("assessment", AssessmentRow::from_stored(assessments::unassign(&app.store, &id, &college_id)?, Utc::now()))
}

/// Assessments assigned to the signed-in college.
pub async fn for_college(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    let me = ctx.role(Role::College)?;
    let cid = me
        .college_id
        .as_deref()
        .ok_or_else(|| AppError::forbidden("college_scope", "no college linked to this account"))?;
    ok_with("assessments", assessments::for_college(&app.store, cid, Utc::now()))
}
