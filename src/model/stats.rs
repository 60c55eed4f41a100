use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-student, per-game aggregate stored at `gameStats/{userId}_{gameId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub user_id: String,
    pub game_id: String,
    /// Absent on documents written before stats were tagged with the college.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college_id: Option<String>,
    #[serde(default)]
    pub best_score: u32,
    #[serde(default)]
    pub last_score: u32,
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
}

impl GameStats {
    pub fn first_play(user_id: &str, game_id: &str, college_id: Option<String>, score: u32, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            college_id,
            best_score: score,
            last_score: score,
            total_score: score as u64,
            play_count: 1,
            last_played_at: Some(at),
        }
    }

    pub fn record(&mut self, score: u32, at: DateTime<Utc>) {
        self.best_score = self.best_score.max(score);
        self.last_score = score;
        self.total_score += score as u64;
        self.play_count += 1;
        self.last_played_at = Some(at);
    }

    pub fn average_score(&self) -> f64 {
        if self.play_count == 0 { 0.0 } else { self.total_score as f64 / self.play_count as f64 }
    }
}
