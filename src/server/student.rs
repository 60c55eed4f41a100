use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::data::{assessments, attempts, stats};
use crate::error::{AppError, AppResult};
use crate::identity::{Role, SessionUser};
use crate::model::GameStats;

use super::context::RequestContext;
use super::{ok_with, AppState};

#[derive(Debug, Deserialize)]
pub struct ScorePayload {
    pub score: u32,
}

/// Per-game stats plus totals for the student dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub games: Vec<GameStats>,
    pub total_plays: u64,
    pub games_played: usize,
    pub best_overall: u32,
}

fn own_college(me: &SessionUser) -> AppResult<&str> {
    me.college_id
        .as_deref()
        .ok_or_else(|| AppError::forbidden("no_college", "this student is not enrolled in a college"))
}

pub async fn assessments(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    let me = ctx.role(Role::Student)?;
    ok_with("assessments", assessments::for_student(&app.store, &me.uid, own_college(me)?, Utc::now()))
}

pub async fn record_play(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(game_id): Path<String>,
    Json(body): Json<ScorePayload>,
) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Student)?;
    ok_with("stats", stats::record_play(&app.store, me, &game_id, body.score, Utc::now())?)
}

pub async fn stats(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    let me = ctx.role(Role::Student)?;
    let games = stats::for_user(&app.store, &me.uid);
    let summary = StudentStats {
        total_plays: games.iter().map(|g| g.play_count as u64).sum(),
        games_played: games.len(),
        best_overall: games.iter().map(|g| g.best_score).max().unwrap_or(0),
        games,
    };
    ok_with("stats", summary)
}

pub async fn start_attempt(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Student)?;
    ok_with("attempt", attempts::start(&app.store, me, &id, Utc::now())?)
}

pub async fn record_attempt_score(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path((id, game_id)): Path<(String, String)>,
    Json(body): Json<ScorePayload>,
) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Student)?;
    ok_with("attempt", attempts::record_score(&app.store, me, &id, &game_id, body.score, Utc::now())?)
}

pub async fn submit_attempt(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    let me = ctx.mutate_as(Role::Student)?;
    ok_with("attempt", attempts::submit(&app.store, me, &id, Utc::now())?)
}
