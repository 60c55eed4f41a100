use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::{Game, GameMeta, GameOverride, CATALOG};
use crate::store::{encode, Collection, SharedStore};

use super::colleges;

fn override_for(store: &SharedStore, id: &str) -> Option<GameOverride> {
    match store.get_as::<GameOverride>(Collection::Games, id) {
        Ok(ov) => ov,
        Err(e) => {
            warn!(target: "xceliq::data", game_id = %id, "ignoring unreadable game override: {}", e);
            None
        }
    }
}

pub fn meta(id: &str) -> AppResult<&'static GameMeta> {
    GameMeta::lookup(id).ok_or_else(|| AppError::not_found("game_not_found", format!("unknown game {}", id)))
}

/// Whole catalog with document overrides applied, in catalog order.
pub fn list(store: &SharedStore) -> Vec<Game> {
    CATALOG.iter().map(|m| Game::from_meta(m, override_for(store, m.id).as_ref())).collect()
}

pub fn get(store: &SharedStore, id: &str) -> AppResult<Game> {
    let m = meta(id)?;
    Ok(Game::from_meta(m, override_for(store, id).as_ref()))
}

/// Merge the given override fields into `games/{id}`.
pub fn update_override(store: &SharedStore, id: &str, patch: &GameOverride) -> AppResult<Game> {
    meta(id)?;
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(AppError::user("missing_field", "name cannot be blank"));
        }
    }
    let doc = encode(patch)?;
    if store.exists(Collection::Games, id) {
        store.merge(Collection::Games, id, doc)?;
    } else {
        store.set(Collection::Games, id, doc);
    }
    get(store, id)
}

/// Games a college's students may play: the assigned list when set, otherwise the
/// whole enabled catalog.
pub fn available_for_college(store: &SharedStore, college_id: &str) -> AppResult<Vec<Game>> {
    let college = colleges::get(store, college_id)?;
    let all = list(store);
    let games = if college.data.games_assigned.is_empty() {
        all.into_iter().filter(|g| g.enabled).collect()
    } else {
        all.into_iter()
            .filter(|g| g.enabled && college.data.games_assigned.iter().any(|a| a == &g.id))
            .collect()
    };
    Ok(games)
}
