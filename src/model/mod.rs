//! Document shapes for every platform collection.
//! Field names follow the stored (camelCase) layout; optional fields default so
//! that older documents missing them still decode.

mod assessment;
mod college;
mod game;
mod profile;
mod stats;

pub use assessment::{Assessment, AssessmentAttempt, AssessmentStatus, AttemptStatus};
pub use college::College;
pub use game::{Difficulty, Game, GameCategory, GameMeta, GameOverride, CATALOG};
pub use profile::{AdminProfile, StudentProfile, UserEntry};
pub use stats::GameStats;

use chrono::{DateTime, Utc};

/// Display form used by list views, e.g. `2025-03-04 09:30`.
pub fn display_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Document id for per-pair records such as stats and attempts.
pub fn pair_id(a: &str, b: &str) -> String {
    format!("{}_{}", a, b)
}
