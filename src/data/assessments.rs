use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{display_time, Assessment, AssessmentAttempt, AssessmentStatus, AttemptStatus, GameMeta};
use crate::store::{Collection, Direction, Query, SharedStore, Stored};

use super::{clean_list, or_empty, required};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub games: Vec<String>,
    #[serde(default)]
    pub assigned_to: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub games: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub status: AssessmentStatus,
    pub games: Vec<String>,
    pub assigned_to: Vec<String>,
    pub created_at: String,
}

impl AssessmentRow {
    pub fn from_stored(a: Stored<Assessment>, now: DateTime<Utc>) -> Self {
        Self {
            status: a.data.status_at(now),
            start_time: display_time(&a.data.start_time),
            end_time: display_time(&a.data.end_time),
            created_at: display_time(&a.data.created_at),
            id: a.id,
            name: a.data.name,
            description: a.data.description,
            games: a.data.games,
            assigned_to: a.data.assigned_to,
        }
    }
}

/// Assessment as a student sees it, with their attempt state.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssessmentRow {
    #[serde(flatten)]
    pub assessment: AssessmentRow,
    pub attempt: Option<AttemptStatus>,
}

fn newest_first() -> Query {
    Query::all().order_by("createdAt", Direction::Desc)
}

pub fn list(store: &SharedStore, now: DateTime<Utc>) -> Vec<AssessmentRow> {
    or_empty("list assessments", store.query_as::<Assessment>(Collection::Assessments, &newest_first()))
        .into_iter()
        .map(|a| AssessmentRow::from_stored(a, now))
        .collect()
}

/// Assessments whose name contains `term`, ignoring case. A blank term matches all.
pub fn search(store: &SharedStore, term: &str, now: DateTime<Utc>) -> Vec<AssessmentRow> {
    let needle = term.trim().to_lowercase();
    list(store, now)
        .into_iter()
        .filter(|a| needle.is_empty() || a.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn get(store: &SharedStore, id: &str) -> AppResult<Stored<Assessment>> {
    let a = store
        .get_as::<Assessment>(Collection::Assessments, id)?
        .ok_or_else(|| AppError::not_found("assessment_not_found", format!("assessment {} does not exist", id)))?;
    Ok(Stored { id: id.to_string(), data: a })
}

fn validate_window(start: &DateTime<Utc>, end: &DateTime<Utc>) -> AppResult<()> {
    if end <= start {
        return Err(AppError::user("invalid_window", "end time must be after start time"));
    }
    Ok(())
}

fn validate_games(games: &[String]) -> AppResult<Vec<String>> {
    let games = clean_list(games);
    if games.is_empty() {
        return Err(AppError::user("missing_games", "an assessment needs at least one game"));
    }
    if let Some(bad) = games.iter().find(|g| GameMeta::lookup(g).is_none()) {
        return Err(AppError::user("unknown_game", format!("unknown game {}", bad)));
    }
    Ok(games)
}

fn validate_colleges(store: &SharedStore, colleges: &[String]) -> AppResult<Vec<String>> {
    let colleges = clean_list(colleges);
    if let Some(bad) = colleges.iter().find(|c| !store.exists(Collection::Colleges, c)) {
        return Err(AppError::not_found("college_not_found", format!("college {} does not exist", bad)));
    }
    Ok(colleges)
}

pub fn create(store: &SharedStore, input: &AssessmentInput, created_by: Option<&str>) -> AppResult<Stored<Assessment>> {
    let name = required("name", &input.name)?;
    validate_window(&input.start_time, &input.end_time)?;
    let assessment = Assessment {
        name,
        description: input.description.trim().to_string(),
        start_time: input.start_time,
        end_time: input.end_time,
        duration_minutes: input.duration_minutes,
        assigned_to: validate_colleges(store, &input.assigned_to)?,
        games: validate_games(&input.games)?,
        created_by: created_by.map(str::to_string),
        created_at: Utc::now(),
    };
    let id = store.insert(Collection::Assessments, &assessment)?;
    info!(target: "xceliq::data", assessment_id = %id, "assessment '{}' created", assessment.name);
    Ok(Stored { id, data: assessment })
}

pub fn update(store: &SharedStore, id: &str, patch: &AssessmentPatch) -> AppResult<Stored<Assessment>> {
    let mut current = get(store, id)?;
    let a = &mut current.data;
    if let Some(n) = &patch.name {
        a.name = required("name", n)?;
    }
    if let Some(d) = &patch.description {
        a.description = d.trim().to_string();
    }
    if let Some(s) = patch.start_time {
        a.start_time = s;
    }
    if let Some(e) = patch.end_time {
        a.end_time = e;
    }
    validate_window(&a.start_time, &a.end_time)?;
    if patch.duration_minutes.is_some() {
        a.duration_minutes = patch.duration_minutes;
    }
    if let Some(g) = &patch.games {
        a.games = validate_games(g)?;
    }
    store.put(Collection::Assessments, id, &current.data)?;
    Ok(current)
}

/// Delete an assessment together with its attempts.
pub fn delete(store: &SharedStore, id: &str) -> AppResult<()> {
    get(store, id)?;
    let attempts = store.query(Collection::AssessmentAttempts, &Query::new().where_eq("assessmentId", id));
    for (attempt_id, _) in &attempts {
        store.delete(Collection::AssessmentAttempts, attempt_id);
    }
    store.delete(Collection::Assessments, id);
    info!(target: "xceliq::data", assessment_id = %id, attempts = attempts.len(), "assessment deleted");
    Ok(())
}

pub fn assign(store: &SharedStore, id: &str, college_id: &str) -> AppResult<Stored<Assessment>> {
    let mut a = get(store, id)?;
    validate_colleges(store, &[college_id.to_string()])?;
    if !a.data.is_assigned_to(college_id) {
        a.data.assigned_to.push(college_id.to_string());
        store.put(Collection::Assessments, id, &a.data)?;
    }
    Ok(a)
}

pub fn unassign(store: &SharedStore, id: &str, college_id: &str) -> AppResult<Stored<Assessment>> {
    let mut a = get(store, id)?;
    if a.data.is_assigned_to(college_id) {
        a.data.assigned_to.retain(|c| c != college_id);
        store.put(Collection::Assessments, id, &a.data)?;
    }
    Ok(a)
}

pub fn for_college(store: &SharedStore, college_id: &str, now: DateTime<Utc>) -> Vec<AssessmentRow> {
    let q = newest_first().array_contains("assignedTo", college_id);
    or_empty("assessments for college", store.query_as::<Assessment>(Collection::Assessments, &q))
        .into_iter()
        .map(|a| AssessmentRow::from_stored(a, now))
        .collect()
}

/// Upcoming and active assessments for the student's college, plus ended ones the
/// student attempted.
pub fn for_student(store: &SharedStore, student_id: &str, college_id: &str, now: DateTime<Utc>) -> Vec<StudentAssessmentRow> {
    for_college(store, college_id, now)
        .into_iter()
        .filter_map(|row| {
            let attempt = store
                .get_as::<AssessmentAttempt>(Collection::AssessmentAttempts, &crate::model::pair_id(&row.id, student_id))
                .ok()
                .flatten()
                .map(|a| a.status);
            if row.status == AssessmentStatus::Ended && attempt.is_none() {
                return None;
            }
            Some(StudentAssessmentRow { assessment: row, attempt })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{new_assessment, new_college};
    use chrono::Duration;

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        for name in ["Aptitude Round 1", "Final APTITUDE", "Memory Sprint", "aptitude-mock"] {
            new_assessment(&store, name, &[], &["memory-match"], now, 0, 60);
        }
        let mut hits: Vec<String> = search(&store, "aPtItUdE", now).into_iter().map(|r| r.name).collect();
        hits.sort();
        assert_eq!(hits, vec!["Aptitude Round 1", "Final APTITUDE", "aptitude-mock"]);
        assert!(search(&store, "nothing-like-this", now).is_empty());
        assert_eq!(search(&store, "  ", now).len(), 4);
    }

    #[test]
    fn create_validates_window_games_and_colleges() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        let base = AssessmentInput {
            name: "Round".into(),
            description: String::new(),
            start_time: now,
            end_time: now + Duration::hours(1),
            duration_minutes: Some(30),
            games: vec!["speed-math".into()],
            assigned_to: vec![],
        };
        assert!(create(&store, &base, Some("admin")).is_ok());

        let bad_window = AssessmentInput { end_time: now, ..base.clone() };
        assert_eq!(create(&store, &bad_window, None).unwrap_err().code_str(), "invalid_window");
        let no_games = AssessmentInput { games: vec![], ..base.clone() };
        assert_eq!(create(&store, &no_games, None).unwrap_err().code_str(), "missing_games");
        let bad_game = AssessmentInput { games: vec!["chess".into()], ..base.clone() };
        assert_eq!(create(&store, &bad_game, None).unwrap_err().code_str(), "unknown_game");
        let bad_college = AssessmentInput { assigned_to: vec!["ghost".into()], ..base };
        assert_eq!(create(&store, &bad_college, None).unwrap_err().http_status(), 404);
    }

    #[test]
    fn assignment_drives_college_listing() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        let c1 = new_college(&store, "One", "one@x.io");
        let c2 = new_college(&store, "Two", "two@x.io");
        let a = new_assessment(&store, "A", &[], &["memory-match"], now, -10, 60);
        assign(&store, &a, &c1).unwrap();
        assign(&store, &a, &c1).unwrap();
        assert_eq!(for_college(&store, &c1, now).len(), 1);
        assert!(for_college(&store, &c2, now).is_empty());
        assert_eq!(for_college(&store, &c1, now)[0].status, AssessmentStatus::Active);
        unassign(&store, &a, &c1).unwrap();
        assert!(for_college(&store, &c1, now).is_empty());
    }

    #[test]
    fn students_do_not_see_unattempted_ended_assessments() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        let c = new_college(&store, "One", "one@x.io");
        new_assessment(&store, "Past", &[&c], &["memory-match"], now, -120, -60);
        new_assessment(&store, "Soon", &[&c], &["memory-match"], now, 60, 120);
        let rows = for_student(&store, "s1", &c, now);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].assessment.name, "Soon");
        assert_eq!(rows[0].attempt, None);
    }
}
