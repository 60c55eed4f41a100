//! Shared seeding helpers for data-layer unit tests.

use chrono::{DateTime, Duration, Utc};

use crate::model::{AdminProfile, Assessment, College, StudentProfile};
use crate::store::{Collection, SharedStore};

pub fn new_college(store: &SharedStore, name: &str, admin_email: &str) -> String {
    let c = College {
        name: name.into(),
        admin_id: None,
        admin_email: admin_email.into(),
        admin_name: String::new(),
        phone: None,
        address: None,
        branches: vec!["CSE".into(), "ECE".into()],
        years: vec!["1".into(), "2".into(), "3".into(), "4".into()],
        games_assigned: vec![],
        created_at: Utc::now(),
    };
    store.insert(Collection::Colleges, &c).unwrap()
}

pub fn new_student(store: &SharedStore, uid: &str, college_id: &str) {
    let s = StudentProfile {
        name: format!("Student {}", uid),
        email: format!("{}@students.x.io", uid),
        college_id: college_id.into(),
        branch: "CSE".into(),
        year: "2".into(),
        roll_number: None,
        created_at: Utc::now(),
    };
    store.put(Collection::Students, uid, &s).unwrap();
}

pub fn new_admin(store: &SharedStore, uid: &str) {
    let a = AdminProfile { name: "Admin".into(), email: format!("{}@x.io", uid), created_at: Utc::now() };
    store.put(Collection::Admins, uid, &a).unwrap();
}

/// Assessment whose window is `[now + start_offset_min, now + end_offset_min)`.
pub fn new_assessment(
    store: &SharedStore,
    name: &str,
    colleges: &[&str],
    games: &[&str],
    now: DateTime<Utc>,
    start_offset_min: i64,
    end_offset_min: i64,
) -> String {
    let a = Assessment {
        name: name.into(),
        description: String::new(),
        start_time: now + Duration::minutes(start_offset_min),
        end_time: now + Duration::minutes(end_offset_min),
        duration_minutes: None,
        assigned_to: colleges.iter().map(|c| c.to_string()).collect(),
        games: games.iter().map(|g| g.to_string()).collect(),
        created_by: None,
        created_at: now,
    };
    store.insert(Collection::Assessments, &a).unwrap()
}
