use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::validate_email;
use crate::model::{display_time, Assessment, College, GameMeta};
use crate::store::{Collection, Direction, Query, SharedStore, Stored};

use super::{clean_list, or_empty, required};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeInput {
    pub name: String,
    pub admin_email: String,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub years: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegePatch {
    pub name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub branches: Option<Vec<String>>,
    pub years: Option<Vec<String>>,
}

/// List view of a college.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollegeRow {
    pub id: String,
    pub name: String,
    pub admin_email: String,
    pub admin_name: String,
    pub branches: Vec<String>,
    pub years: Vec<String>,
    pub games_assigned: Vec<String>,
    pub student_count: usize,
    pub created_at: String,
}

pub fn student_count(store: &SharedStore, college_id: &str) -> usize {
    store.count(Collection::Students, &Query::new().where_eq("collegeId", college_id))
}

pub fn list(store: &SharedStore) -> Vec<CollegeRow> {
    let q = Query::all().order_by("name", Direction::Asc);
    or_empty("list colleges", store.query_as::<College>(Collection::Colleges, &q))
        .into_iter()
        .map(|c| CollegeRow {
            student_count: student_count(store, &c.id),
            created_at: display_time(&c.data.created_at),
            id: c.id,
            name: c.data.name,
            admin_email: c.data.admin_email,
            admin_name: c.data.admin_name,
            branches: c.data.branches,
            years: c.data.years,
            games_assigned: c.data.games_assigned,
        })
        .collect()
}

pub fn get(store: &SharedStore, id: &str) -> AppResult<Stored<College>> {
    let college = store
        .get_as::<College>(Collection::Colleges, id)?
        .ok_or_else(|| AppError::not_found("college_not_found", format!("college {} does not exist", id)))?;
    Ok(Stored { id: id.to_string(), data: college })
}

pub(crate) fn ensure_admin_email_free(store: &SharedStore, email: &str, except: Option<&str>) -> AppResult<()> {
    let q = Query::new().where_eq("adminEmail", email);
    let taken = store.query(Collection::Colleges, &q).into_iter().any(|(id, _)| Some(id.as_str()) != except);
    if taken {
        return Err(AppError::conflict("college_admin_email_in_use", format!("{} already administers a college", email)));
    }
    Ok(())
}

/// Create a college document. `admin_id` links an existing account; without it the
/// college account is linked by `adminEmail` when it signs in.
pub fn create(store: &SharedStore, input: &CollegeInput, admin_id: Option<&str>) -> AppResult<Stored<College>> {
    let name = required("name", &input.name)?;
    let admin_email = validate_email(&input.admin_email)?;
    ensure_admin_email_free(store, &admin_email, None)?;
    let college = College {
        name,
        admin_id: admin_id.map(str::to_string),
        admin_email,
        admin_name: input.admin_name.trim().to_string(),
        phone: input.phone.clone().filter(|p| !p.trim().is_empty()),
        address: input.address.clone().filter(|a| !a.trim().is_empty()),
        branches: clean_list(&input.branches),
        years: clean_list(&input.years),
        games_assigned: Vec::new(),
        created_at: Utc::now(),
    };
    let id = store.insert(Collection::Colleges, &college)?;
    info!(target: "xceliq::data", college_id = %id, "college '{}' created", college.name);
    Ok(Stored { id, data: college })
}

pub fn update(store: &SharedStore, id: &str, patch: &CollegePatch) -> AppResult<Stored<College>> {
    let mut current = get(store, id)?;
    let c = &mut current.data;
    if let Some(n) = &patch.name {
        c.name = required("name", n)?;
    }
    if let Some(e) = &patch.admin_email {
        let e = validate_email(e)?;
        if e != c.admin_email {
            ensure_admin_email_free(store, &e, Some(id))?;
            c.admin_email = e;
        }
    }
    if let Some(n) = &patch.admin_name {
        c.admin_name = n.trim().to_string();
    }
    if let Some(p) = &patch.phone {
        c.phone = Some(p.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(a) = &patch.address {
        c.address = Some(a.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(b) = &patch.branches {
        c.branches = clean_list(b);
    }
    if let Some(y) = &patch.years {
        c.years = clean_list(y);
    }
    store.put(Collection::Colleges, id, &current.data)?;
    Ok(current)
}

/// Delete a college that has no students. Assessment assignments pointing at it are
/// removed as well; there is no referential integrity to do it for us.
pub fn delete(store: &SharedStore, id: &str) -> AppResult<()> {
    let college = get(store, id)?;
    let students = student_count(store, id);
    if students > 0 {
        return Err(AppError::conflict(
            "college_has_students",
            format!("college '{}' still has {} student(s); remove them first", college.data.name, students),
        ));
    }
    let assigned = Query::new().array_contains("assignedTo", id);
    for a in or_empty("assessments assigned to college", store.query_as::<Assessment>(Collection::Assessments, &assigned)) {
        let mut data = a.data;
        data.assigned_to.retain(|c| c != id);
        store.put(Collection::Assessments, &a.id, &data)?;
    }
    store.delete(Collection::Colleges, id);
    info!(target: "xceliq::data", college_id = %id, "college '{}' deleted", college.data.name);
    Ok(())
}

pub fn assign_game(store: &SharedStore, id: &str, game_id: &str) -> AppResult<Stored<College>> {
    if GameMeta::lookup(game_id).is_none() {
        return Err(AppError::not_found("game_not_found", format!("unknown game {}", game_id)));
    }
    let mut college = get(store, id)?;
    if !college.data.games_assigned.iter().any(|g| g == game_id) {
        college.data.games_assigned.push(game_id.to_string());
        store.put(Collection::Colleges, id, &college.data)?;
    }
    Ok(college)
}

pub fn unassign_game(store: &SharedStore, id: &str, game_id: &str) -> AppResult<Stored<College>> {
    let mut college = get(store, id)?;
    let before = college.data.games_assigned.len();
    college.data.games_assigned.retain(|g| g != game_id);
    if college.data.games_assigned.len() != before {
        store.put(Collection::Colleges, id, &college.data)?;
    }
    Ok(college)
}

/// Link a college to the account that administers it. A college has at most one
/// account; relinking to a different one is a conflict.
pub fn link_admin(store: &SharedStore, id: &str, admin_id: &str, admin_email: &str) -> AppResult<()> {
    let mut college = get(store, id)?;
    if let Some(current) = college.data.admin_id.as_deref().filter(|cur| *cur != admin_id) {
        return Err(AppError::conflict(
            "college_already_linked",
            format!("college '{}' is already administered by account {}", college.data.name, current),
        ));
    }
    if admin_email != college.data.admin_email {
        ensure_admin_email_free(store, admin_email, Some(id))?;
    }
    college.data.admin_id = Some(admin_id.to_string());
    college.data.admin_email = admin_email.to_string();
    store.put(Collection::Colleges, id, &college.data)?;
    Ok(())
}

/// College administered by `uid`, if any.
pub fn find_by_admin(store: &SharedStore, uid: &str) -> Option<Stored<College>> {
    let q = Query::new().where_eq("adminId", uid).limit(1);
    or_empty("college by admin", store.query_as::<College>(Collection::Colleges, &q)).into_iter().next()
}
