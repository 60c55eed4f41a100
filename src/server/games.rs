use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::data::{games, stats};
use crate::error::{AppError, AppResult};
use crate::identity::{require_college_scope, Role};
use crate::model::GameOverride;

use super::context::RequestContext;
use super::{ok_with, AppState};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
    pub college_id: Option<String>,
    pub limit: Option<usize>,
}

/// Admins see the whole catalog (disabled games included); college and student
/// sessions see what their college may play.
pub async fn list(State(app): State<AppState>, ctx: RequestContext) -> AppResult<Json<JsonValue>> {
    let me = ctx.user()?;
    let list = match (me.role, me.college_id.as_deref()) {
        (Role::Admin, _) => games::list(&app.store),
        (_, Some(cid)) => games::available_for_college(&app.store, cid)?,
        (_, None) => Vec::new(),
    };
    ok_with("games", list)
}

pub async fn get_one(State(app): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<JsonValue>> {
    ctx.user()?;
    ok_with("game", games::get(&app.store, &id)?)
}

pub async fn update(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(patch): Json<GameOverride>,
) -> AppResult<Json<JsonValue>> {
    ctx.mutate_as(Role::Admin)?;
    ok_with("game", games::update_override(&app.store, &id, &patch)?)
}

/// Admins may pick any college (or none for the global board); everyone else is
/// pinned to their own college.
pub async fn leaderboard(
    State(app): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(p): Query<LeaderboardParams>,
) -> AppResult<Json<JsonValue>> {
    let me = ctx.user()?;
    let college = match me.role {
        Role::Admin => p.college_id.clone().filter(|c| !c.is_empty()),
        Role::College | Role::Student => {
            let own = me
                .college_id
                .clone()
                .ok_or_else(|| AppError::forbidden("college_scope", "no college linked to this account"))?;
            if let Some(asked) = p.college_id.as_deref().filter(|c| !c.is_empty()) {
                if me.role == Role::College {
                    require_college_scope(me, asked)?;
                } else if asked != own {
                    return Err(AppError::forbidden("college_scope", "not permitted for this college"));
                }
            }
            Some(own)
        }
    };
    let limit = p.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).clamp(1, 100);
    ok_with("leaderboard", stats::leaderboard(&app.store, college.as_deref(), &id, limit)?)
}
