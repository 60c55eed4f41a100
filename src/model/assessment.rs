use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// College ids this assessment is assigned to.
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// Game ids making up the assessment.
    #[serde(default)]
    pub games: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Upcoming,
    Active,
    Ended,
}

impl Assessment {
    /// Window is inclusive of start and exclusive of end.
    pub fn status_at(&self, now: DateTime<Utc>) -> AssessmentStatus {
        if now < self.start_time {
            AssessmentStatus::Upcoming
        } else if now < self.end_time {
            AssessmentStatus::Active
        } else {
            AssessmentStatus::Ended
        }
    }

    pub fn is_assigned_to(&self, college_id: &str) -> bool {
        self.assigned_to.iter().any(|c| c == college_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAttempt {
    pub assessment_id: String,
    pub student_id: String,
    pub college_id: String,
    /// game id -> score
    #[serde(default)]
    pub scores: BTreeMap<String, u32>,
    #[serde(default)]
    pub total_score: u32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}
