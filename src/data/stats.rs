use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::identity::SessionUser;
use crate::model::{pair_id, GameStats, StudentProfile};
use crate::store::{Collection, Query, SharedStore, Stored};

use super::{games, or_empty};

/// Record one practice play for a student and return the updated aggregate.
pub fn record_play(store: &SharedStore, user: &SessionUser, game_id: &str, score: u32, at: DateTime<Utc>) -> AppResult<GameStats> {
    let college_id = user
        .college_id
        .as_deref()
        .ok_or_else(|| AppError::forbidden("no_college", "only enrolled students can record plays"))?;
    let game = games::get(store, game_id)?;
    if score > game.max_score {
        return Err(AppError::user("score_out_of_range", format!("score {} exceeds the maximum of {}", score, game.max_score)));
    }
    let available = games::available_for_college(store, college_id)?;
    if !available.iter().any(|g| g.id == game_id) {
        return Err(AppError::forbidden("game_not_available", format!("{} is not available to your college", game.name)));
    }

    let id = pair_id(&user.uid, game_id);
    let stats = match store.get_as::<GameStats>(Collection::GameStats, &id)? {
        Some(mut s) => {
            s.record(score, at);
            // backfill the college tag on documents that predate it
            s.college_id.get_or_insert_with(|| college_id.to_string());
            s
        }
        None => GameStats::first_play(&user.uid, game_id, Some(college_id.to_string()), score, at),
    };
    store.put(Collection::GameStats, &id, &stats)?;
    Ok(stats)
}

pub fn for_user(store: &SharedStore, uid: &str) -> Vec<GameStats> {
    let q = Query::new().where_eq("userId", uid);
    or_empty("stats for user", store.query_as::<GameStats>(Collection::GameStats, &q))
        .into_iter()
        .map(|s| s.data)
        .collect()
}

/// Stats of a college's students. Tagged documents are found by `collegeId`;
/// untagged legacy documents are matched against the college's student list.
pub fn for_college(store: &SharedStore, college_id: &str) -> Vec<GameStats> {
    let tagged = Query::new().where_eq("collegeId", college_id);
    let mut out: Vec<GameStats> = or_empty("stats for college", store.query_as::<GameStats>(Collection::GameStats, &tagged))
        .into_iter()
        .map(|s| s.data)
        .collect();

    let students: HashSet<String> = or_empty(
        "students for stats cross-reference",
        store.query_as::<StudentProfile>(Collection::Students, &Query::new().where_eq("collegeId", college_id)),
    )
    .into_iter()
    .map(|s| s.id)
    .collect();
    if students.is_empty() {
        return out;
    }
    let untagged = or_empty("untagged stats", store.query_as::<GameStats>(Collection::GameStats, &Query::all()))
        .into_iter()
        .filter(|s: &Stored<GameStats>| s.data.college_id.is_none() && students.contains(&s.data.user_id))
        .map(|s| s.data);
    out.extend(untagged);
    out
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub name: String,
    pub best_score: u32,
    pub play_count: u32,
}

/// Best scores for one game, highest first. Ties go to fewer plays, then user id.
pub fn leaderboard(store: &SharedStore, college_id: Option<&str>, game_id: &str, limit: usize) -> AppResult<Vec<LeaderboardEntry>> {
    games::meta(game_id)?;
    let mut rows: Vec<GameStats> = match college_id {
        Some(cid) => for_college(store, cid),
        None => or_empty("all stats", store.query_as::<GameStats>(Collection::GameStats, &Query::all()))
            .into_iter()
            .map(|s| s.data)
            .collect(),
    };
    rows.retain(|s| s.game_id == game_id);
    rows.sort_by(|a, b| {
        b.best_score
            .cmp(&a.best_score)
            .then(a.play_count.cmp(&b.play_count))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    let entries = rows
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, s)| {
            let name = store
                .get_as::<StudentProfile>(Collection::Students, &s.user_id)
                .ok()
                .flatten()
                .map(|p| p.name)
                .unwrap_or_else(|| "Unknown student".to_string());
            LeaderboardEntry { rank: i + 1, name, user_id: s.user_id, best_score: s.best_score, play_count: s.play_count }
        })
        .collect();
    Ok(entries)
}
