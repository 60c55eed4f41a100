use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::model::{AssessmentStatus, AttemptStatus, GameMeta, GameStats, CATALOG};
use crate::store::{Collection, Query, SharedStore};

use super::{assessments, attempts, colleges, stats, users};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub colleges: usize,
    pub students: usize,
    pub admins: usize,
    pub assessments: usize,
    pub active_assessments: usize,
    pub games: usize,
    pub total_plays: u64,
}

pub fn overview(store: &SharedStore, now: DateTime<Utc>) -> Overview {
    let all_assessments = assessments::list(store, now);
    let total_plays: u64 = super::or_empty("stats for overview", store.query_as::<GameStats>(Collection::GameStats, &Query::all()))
        .iter()
        .map(|s| s.data.play_count as u64)
        .sum();
    Overview {
        colleges: store.count(Collection::Colleges, &Query::all()),
        students: store.count(Collection::Students, &Query::all()),
        admins: store.count(Collection::Admins, &Query::all()),
        active_assessments: all_assessments.iter().filter(|a| a.status == AssessmentStatus::Active).count(),
        assessments: all_assessments.len(),
        games: CATALOG.len(),
        total_plays,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameAggregate {
    pub game_id: String,
    pub name: String,
    pub players: usize,
    pub plays: u64,
    pub average_best: f64,
    pub top_score: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub uid: String,
    pub name: String,
    pub branch: String,
    pub year: String,
    pub games_played: usize,
    pub total_plays: u64,
    pub average_best: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollegeReport {
    pub college_id: String,
    pub name: String,
    pub student_count: usize,
    pub assessments_assigned: usize,
    pub games: Vec<GameAggregate>,
    pub students: Vec<StudentSummary>,
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64;
    (avg * 100.0).round() / 100.0
}

pub fn college_report(store: &SharedStore, college_id: &str, now: DateTime<Utc>) -> AppResult<CollegeReport> {
    let college = colleges::get(store, college_id)?;
    let students = users::students_of_college(store, college_id, None, None);
    let college_stats = stats::for_college(store, college_id);

    let mut by_game: BTreeMap<String, Vec<&GameStats>> = BTreeMap::new();
    let mut by_student: HashMap<&str, Vec<&GameStats>> = HashMap::new();
    for s in &college_stats {
        by_game.entry(s.game_id.clone()).or_default().push(s);
        by_student.entry(s.user_id.as_str()).or_default().push(s);
    }

    let games = by_game
        .into_iter()
        .map(|(game_id, rows)| {
            let bests: Vec<u32> = rows.iter().map(|s| s.best_score).collect();
            GameAggregate {
                name: GameMeta::lookup(&game_id).map(|m| m.name.to_string()).unwrap_or_else(|| game_id.clone()),
                players: rows.len(),
                plays: rows.iter().map(|s| s.play_count as u64).sum(),
                average_best: mean(&bests),
                top_score: bests.iter().copied().max().unwrap_or(0),
                game_id,
            }
        })
        .collect();

    let summaries = students
        .iter()
        .map(|st| {
            let rows = by_student.get(st.uid.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
            let bests: Vec<u32> = rows.iter().map(|s| s.best_score).collect();
            StudentSummary {
                uid: st.uid.clone(),
                name: st.name.clone(),
                branch: st.branch.clone(),
                year: st.year.clone(),
                games_played: rows.len(),
                total_plays: rows.iter().map(|s| s.play_count as u64).sum(),
                average_best: mean(&bests),
            }
        })
        .collect();

    Ok(CollegeReport {
        college_id: college.id,
        name: college.data.name,
        student_count: students.len(),
        assessments_assigned: assessments::for_college(store, college_id, now).len(),
        games,
        students: summaries,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollegeAttempts {
    pub college_id: String,
    pub started: usize,
    pub submitted: usize,
    pub average_total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentReport {
    pub assessment_id: String,
    pub name: String,
    pub status: AssessmentStatus,
    pub assigned_colleges: usize,
    pub started: usize,
    pub submitted: usize,
    pub average_total: f64,
    pub top_total: u32,
    pub per_college: Vec<CollegeAttempts>,
}

/// Attempt statistics; averages and the top total cover submitted attempts only.
pub fn assessment_report(store: &SharedStore, assessment_id: &str, now: DateTime<Utc>) -> AppResult<AssessmentReport> {
    let a = assessments::get(store, assessment_id)?;
    let all = attempts::for_assessment(store, assessment_id);
    let submitted_totals = |college: Option<&str>| -> Vec<u32> {
        all.iter()
            .filter(|t| t.status == AttemptStatus::Submitted)
            .filter(|t| college.map(|c| t.college_id == c).unwrap_or(true))
            .map(|t| t.total_score)
            .collect()
    };
    let totals = submitted_totals(None);
    let per_college = a
        .data
        .assigned_to
        .iter()
        .map(|cid| {
            let t = submitted_totals(Some(cid.as_str()));
            CollegeAttempts {
                college_id: cid.clone(),
                started: all.iter().filter(|x| &x.college_id == cid).count(),
                submitted: t.len(),
                average_total: mean(&t),
            }
        })
        .collect();
    Ok(AssessmentReport {
        assessment_id: a.id,
        status: a.data.status_at(now),
        name: a.data.name,
        assigned_colleges: a.data.assigned_to.len(),
        started: all.len(),
        submitted: totals.len(),
        average_total: mean(&totals),
        top_total: totals.iter().copied().max().unwrap_or(0),
        per_college,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{new_admin, new_assessment, new_college, new_student};
    use crate::identity::{Role, SessionUser};

    fn student(uid: &str, college: &str) -> SessionUser {
        SessionUser { uid: uid.into(), email: format!("{}@x.io", uid), role: Role::Student, name: uid.into(), college_id: Some(college.into()) }
    }

    #[test]
    fn overview_counts() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        new_admin(&store, "a1");
        let c = new_college(&store, "A", "a@x.io");
        new_student(&store, "s1", &c);
        new_assessment(&store, "Live", &[&c], &["speed-math"], now, -1, 60);
        new_assessment(&store, "Later", &[&c], &["speed-math"], now, 60, 120);
        stats::record_play(&store, &student("s1", &c), "speed-math", 10, now).unwrap();
        stats::record_play(&store, &student("s1", &c), "speed-math", 20, now).unwrap();
        let o = overview(&store, now);
        assert_eq!((o.colleges, o.students, o.admins), (1, 1, 1));
        assert_eq!((o.assessments, o.active_assessments), (2, 1));
        assert_eq!(o.total_plays, 2);
    }

    #[test]
    fn college_report_aggregates_per_game_and_student() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        let c = new_college(&store, "A", "a@x.io");
        new_student(&store, "s1", &c);
        new_student(&store, "s2", &c);
        stats::record_play(&store, &student("s1", &c), "speed-math", 40, now).unwrap();
        stats::record_play(&store, &student("s2", &c), "speed-math", 90, now).unwrap();
        stats::record_play(&store, &student("s2", &c), "memory-match", 15, now).unwrap();

        let r = college_report(&store, &c, now).unwrap();
        assert_eq!(r.student_count, 2);
        let sm = r.games.iter().find(|g| g.game_id == "speed-math").unwrap();
        assert_eq!((sm.players, sm.top_score), (2, 90));
        assert!((sm.average_best - 65.0).abs() < 1e-9);
        let s2 = r.students.iter().find(|s| s.uid == "s2").unwrap();
        assert_eq!(s2.games_played, 2);
        assert!((s2.average_best - 52.5).abs() < 1e-9);
    }

    #[test]
    fn assessment_report_counts_submitted_only() {
        let store = SharedStore::in_memory("t");
        let now = Utc::now();
        let c = new_college(&store, "A", "a@x.io");
        let a = new_assessment(&store, "Live", &[&c], &["speed-math"], now, -1, 60);
        let (s1, s2) = (student("s1", &c), student("s2", &c));
        attempts::start(&store, &s1, &a, now).unwrap();
        attempts::record_score(&store, &s1, &a, "speed-math", 70, now).unwrap();
        attempts::submit(&store, &s1, &a, now).unwrap();
        attempts::start(&store, &s2, &a, now).unwrap();
        attempts::record_score(&store, &s2, &a, "speed-math", 99, now).unwrap();

        let r = assessment_report(&store, &a, now).unwrap();
        assert_eq!((r.started, r.submitted, r.top_total), (2, 1, 70));
        assert_eq!(r.per_college[0].started, 2);
        assert_eq!(r.status, AssessmentStatus::Active);
    }
}
