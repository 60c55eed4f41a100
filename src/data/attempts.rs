use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::SessionUser;
use crate::model::{pair_id, Assessment, AssessmentAttempt, AssessmentStatus, AttemptStatus, GameMeta};
use crate::store::{Collection, Query, SharedStore, Stored};

use super::{assessments, or_empty};

fn student_college(user: &SessionUser) -> AppResult<&str> {
    user.college_id
        .as_deref()
        .ok_or_else(|| AppError::forbidden("no_college", "only enrolled students can take assessments"))
}

fn open_assessment(store: &SharedStore, user: &SessionUser, assessment_id: &str, now: DateTime<Utc>) -> AppResult<Stored<Assessment>> {
    let college_id = student_college(user)?;
    let a = assessments::get(store, assessment_id)?;
    if !a.data.is_assigned_to(college_id) {
        return Err(AppError::forbidden("not_assigned", "this assessment is not assigned to your college"));
    }
    match a.data.status_at(now) {
        AssessmentStatus::Active => Ok(a),
        AssessmentStatus::Upcoming => Err(AppError::conflict("assessment_not_started", "this assessment has not started yet")),
        AssessmentStatus::Ended => Err(AppError::conflict("assessment_ended", "this assessment has ended")),
    }
}

fn load(store: &SharedStore, assessment_id: &str, student_id: &str) -> AppResult<Option<AssessmentAttempt>> {
    Ok(store.get_as::<AssessmentAttempt>(Collection::AssessmentAttempts, &pair_id(assessment_id, student_id))?)
}

/// Start (or resume) the student's single attempt at an active assessment.
pub fn start(store: &SharedStore, user: &SessionUser, assessment_id: &str, now: DateTime<Utc>) -> AppResult<AssessmentAttempt> {
    open_assessment(store, user, assessment_id, now)?;
    if let Some(existing) = load(store, assessment_id, &user.uid)? {
        return match existing.status {
            AttemptStatus::InProgress => Ok(existing),
            AttemptStatus::Submitted => Err(AppError::conflict("already_submitted", "you have already submitted this assessment")),
        };
    }
    let attempt = AssessmentAttempt {
        assessment_id: assessment_id.to_string(),
        student_id: user.uid.clone(),
        college_id: student_college(user)?.to_string(),
        scores: BTreeMap::new(),
        total_score: 0,
        status: AttemptStatus::InProgress,
        started_at: now,
        submitted_at: None,
    };
    store.put(Collection::AssessmentAttempts, &pair_id(assessment_id, &user.uid), &attempt)?;
    info!(target: "xceliq::data", assessment_id = %assessment_id, uid = %user.uid, "attempt started");
    Ok(attempt)
}

fn in_progress(store: &SharedStore, user: &SessionUser, assessment_id: &str) -> AppResult<AssessmentAttempt> {
    let attempt = load(store, assessment_id, &user.uid)?
        .ok_or_else(|| AppError::not_found("attempt_not_found", "start the assessment first"))?;
    if attempt.status == AttemptStatus::Submitted {
        return Err(AppError::conflict("already_submitted", "you have already submitted this assessment"));
    }
    Ok(attempt)
}

/// Store the score for one game of the attempt; replaying a game overwrites its score.
pub fn record_score(
    store: &SharedStore,
    user: &SessionUser,
    assessment_id: &str,
    game_id: &str,
    score: u32,
    now: DateTime<Utc>,
) -> AppResult<AssessmentAttempt> {
    let a = open_assessment(store, user, assessment_id, now)?;
    if !a.data.games.iter().any(|g| g == game_id) {
        return Err(AppError::user("game_not_in_assessment", format!("{} is not part of this assessment", game_id)));
    }
    let max = GameMeta::lookup(game_id).map(|m| m.max_score).unwrap_or(u32::MAX);
    if score > max {
        return Err(AppError::user("score_out_of_range", format!("score {} exceeds the maximum of {}", score, max)));
    }
    let mut attempt = in_progress(store, user, assessment_id)?;
    attempt.scores.insert(game_id.to_string(), score);
    attempt.total_score = attempt.scores.values().sum();
    store.put(Collection::AssessmentAttempts, &pair_id(assessment_id, &user.uid), &attempt)?;
    Ok(attempt)
}

/// Submit the attempt. Allowed after the window closes so a late submit still counts
/// what was recorded in time.
pub fn submit(store: &SharedStore, user: &SessionUser, assessment_id: &str, now: DateTime<Utc>) -> AppResult<AssessmentAttempt> {
    let mut attempt = in_progress(store, user, assessment_id)?;
    attempt.total_score = attempt.scores.values().sum();
    attempt.status = AttemptStatus::Submitted;
    attempt.submitted_at = Some(now);
    store.put(Collection::AssessmentAttempts, &pair_id(assessment_id, &user.uid), &attempt)?;
    info!(target: "xceliq::data", assessment_id = %assessment_id, uid = %user.uid, total = attempt.total_score, "attempt submitted");
    Ok(attempt)
}

pub fn for_assessment(store: &SharedStore, assessment_id: &str) -> Vec<AssessmentAttempt> {
    let q = Query::new().where_eq("assessmentId", assessment_id);
    or_empty("attempts for assessment", store.query_as::<AssessmentAttempt>(Collection::AssessmentAttempts, &q))
        .into_iter()
        .map(|s| s.data)
        .collect()
}
