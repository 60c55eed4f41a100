use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{validate_email, Identity, IdentityProvider, Role};
use crate::model::{display_time, AdminProfile, College, StudentProfile, UserEntry};
use crate::store::{encode, Collection, Direction, Query, SharedStore};

use super::colleges::{self, CollegeInput};
use super::{or_empty, required};

/// Admin-side account creation for any role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    /// Student: college of enrolment. College: existing college to link.
    #[serde(default)]
    pub college_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    /// College: details for a new college when `college_id` is absent.
    #[serde(default)]
    pub college: Option<CollegeInput>,
}

/// Student self-registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub college_id: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub roll_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub roll_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<UserEntry> for UserRow {
    fn from(e: UserEntry) -> Self {
        Self { created_at: display_time(&e.created_at), uid: e.uid, email: e.email, name: e.name, role: e.role }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserRow,
    /// Role profile document (student/admin profile or administered college).
    pub profile: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub branch: String,
    pub year: String,
    pub roll_number: Option<String>,
    pub created_at: String,
}

fn write_entry(store: &SharedStore, identity: &Identity, name: &str, role: Role) -> AppResult<UserEntry> {
    let entry = UserEntry {
        uid: identity.uid.clone(),
        email: identity.email.clone(),
        name: name.to_string(),
        role,
        created_at: Utc::now(),
    };
    store.put(Collection::Users, &identity.uid, &entry)?;
    Ok(entry)
}

fn student_profile(
    store: &SharedStore,
    identity: &Identity,
    name: &str,
    college_id: &str,
    branch: &str,
    year: &str,
    roll_number: Option<&str>,
) -> AppResult<StudentProfile> {
    let college = colleges::get(store, college_id)?;
    let branch = branch.trim();
    let year = year.trim();
    if !college.data.branches.is_empty() && !college.data.has_branch(branch) {
        return Err(AppError::user("invalid_branch", format!("'{}' is not a branch of {}", branch, college.data.name)));
    }
    if !college.data.years.is_empty() && !college.data.has_year(year) {
        return Err(AppError::user("invalid_year", format!("'{}' is not a year offered by {}", year, college.data.name)));
    }
    Ok(StudentProfile {
        name: name.to_string(),
        email: identity.email.clone(),
        college_id: college.id,
        branch: branch.to_string(),
        year: year.to_string(),
        roll_number: roll_number.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        created_at: Utc::now(),
    })
}

/// Write the role profile for a freshly created identity.
fn write_profile(store: &SharedStore, identity: &Identity, name: &str, input: &NewUser) -> AppResult<()> {
    match input.role {
        Role::Admin => {
            let p = AdminProfile { name: name.to_string(), email: identity.email.clone(), created_at: Utc::now() };
            store.put(Collection::Admins, &identity.uid, &p)?;
        }
        Role::Student => {
            let college_id = input
                .college_id
                .as_deref()
                .ok_or_else(|| AppError::user("missing_field", "collegeId is required for students"))?;
            let p = student_profile(
                store,
                identity,
                name,
                college_id,
                input.branch.as_deref().unwrap_or_default(),
                input.year.as_deref().unwrap_or_default(),
                input.roll_number.as_deref(),
            )?;
            store.put(Collection::Students, &identity.uid, &p)?;
        }
        Role::College => match (&input.college_id, &input.college) {
            (Some(id), _) => colleges::link_admin(store, id, &identity.uid, &identity.email)?,
            (None, Some(details)) => {
                let details = CollegeInput {
                    admin_email: identity.email.clone(),
                    admin_name: if details.admin_name.trim().is_empty() { name.to_string() } else { details.admin_name.clone() },
                    ..details.clone()
                };
                colleges::create(store, &details, Some(&identity.uid))?;
            }
            (None, None) => {
                return Err(AppError::user("missing_field", "collegeId or college details are required for college accounts"));
            }
        },
    }
    Ok(())
}

/// Undo [`write_profile`]: a linked college is unlinked, a college created for the
/// account is removed.
fn remove_profile(store: &SharedStore, uid: &str, input: &NewUser) -> AppResult<()> {
    match input.role {
        Role::Admin => {
            store.delete(Collection::Admins, uid);
        }
        Role::Student => {
            store.delete(Collection::Students, uid);
        }
        Role::College => {
            if let Some(mut c) = colleges::find_by_admin(store, uid) {
                if input.college_id.is_some() {
                    c.data.admin_id = None;
                    store.put(Collection::Colleges, &c.id, &c.data)?;
                } else {
                    store.delete(Collection::Colleges, &c.id);
                }
            }
        }
    }
    Ok(())
}

/// Create identity, role profile and directory entry. Whatever was already written is
/// removed again when a later step fails so no orphan account can sign in.
pub fn create_user(store: &SharedStore, idp: &dyn IdentityProvider, input: &NewUser) -> AppResult<UserRow> {
    let name = required("name", &input.name)?;
    let identity = idp.create_account(&input.email, &input.password, &name)?;
    if let Err(e) = write_profile(store, &identity, &name, input) {
        warn!(target: "xceliq::data", uid = %identity.uid, "profile write failed, removing account: {}", e);
        let _ = idp.delete_account(&identity.uid);
        return Err(e);
    }
    let entry = match write_entry(store, &identity, &name, input.role) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(target: "xceliq::data", uid = %identity.uid, "directory write failed, removing account: {}", e);
            if let Err(undo) = remove_profile(store, &identity.uid, input) {
                warn!(target: "xceliq::data", uid = %identity.uid, "profile rollback failed: {}", undo);
            }
            let _ = idp.delete_account(&identity.uid);
            return Err(e);
        }
    };
    info!(target: "xceliq::data", uid = %identity.uid, role = %input.role, "user created");
    Ok(entry.into())
}

pub fn register_student(store: &SharedStore, idp: &dyn IdentityProvider, reg: &Registration) -> AppResult<UserRow> {
    let input = NewUser {
        email: reg.email.clone(),
        password: reg.password.clone(),
        name: reg.name.clone(),
        role: Role::Student,
        college_id: Some(reg.college_id.clone()),
        branch: Some(reg.branch.clone()),
        year: Some(reg.year.clone()),
        roll_number: reg.roll_number.clone(),
        college: None,
    };
    // validate the college before an account exists
    colleges::get(store, &reg.college_id)?;
    create_user(store, idp, &input)
}

pub fn list(store: &SharedStore, role: Option<Role>, offset: usize, limit: Option<usize>) -> Vec<UserRow> {
    let mut q = Query::all().order_by("createdAt", Direction::Desc).offset(offset);
    if let Some(r) = role {
        q = q.where_eq("role", r.as_str());
    }
    if let Some(n) = limit {
        q = q.limit(n);
    }
    or_empty("list users", store.query_as::<UserEntry>(Collection::Users, &q))
        .into_iter()
        .map(|s| s.data.into())
        .collect()
}

fn entry(store: &SharedStore, uid: &str) -> AppResult<UserEntry> {
    store
        .get_as::<UserEntry>(Collection::Users, uid)?
        .ok_or_else(|| AppError::not_found("user_not_found", format!("user {} does not exist", uid)))
}

pub fn get(store: &SharedStore, uid: &str) -> AppResult<UserDetail> {
    let e = entry(store, uid)?;
    let (profile, college_id) = match e.role {
        Role::Admin => (store.get(Collection::Admins, uid).map(JsonValue::Object), None),
        Role::Student => {
            let doc = store.get(Collection::Students, uid);
            let cid = doc.as_ref().and_then(|d| d.get("collegeId")).and_then(|v| v.as_str()).map(str::to_string);
            (doc.map(JsonValue::Object), cid)
        }
        Role::College => match colleges::find_by_admin(store, uid) {
            Some(c) => (Some(JsonValue::Object(encode(&c.data)?)), Some(c.id)),
            None => (None, None),
        },
    };
    Ok(UserDetail { user: e.into(), profile, college_id })
}

/// Apply a student patch to the profile in memory, checking branch and year against
/// the student's college.
fn patch_student(store: &SharedStore, p: &mut StudentProfile, patch: &UserPatch) -> AppResult<()> {
    if patch.branch.is_some() || patch.year.is_some() {
        let college = colleges::get(store, &p.college_id)?;
        if let Some(b) = &patch.branch {
            if !college.data.branches.is_empty() && !college.data.has_branch(b) {
                return Err(AppError::user("invalid_branch", format!("'{}' is not a branch of {}", b, college.data.name)));
            }
            p.branch = b.trim().to_string();
        }
        if let Some(y) = &patch.year {
            if !college.data.years.is_empty() && !college.data.has_year(y) {
                return Err(AppError::user("invalid_year", format!("'{}' is not a year offered by {}", y, college.data.name)));
            }
            p.year = y.trim().to_string();
        }
    }
    if let Some(r) = &patch.roll_number {
        p.roll_number = Some(r.trim().to_string()).filter(|s| !s.is_empty());
    }
    Ok(())
}

/// Update name, email and student details. Every check runs before the first write so
/// a rejected patch leaves identity, directory entry and profile untouched.
pub fn update(store: &SharedStore, idp: &dyn IdentityProvider, uid: &str, patch: &UserPatch) -> AppResult<UserDetail> {
    let mut e = entry(store, uid)?;
    let name = match &patch.name {
        Some(n) => Some(required("name", n)?),
        None => None,
    };
    let email = patch.email.as_deref().map(validate_email).transpose()?;

    let mut student = match e.role {
        Role::Student => store.get_as::<StudentProfile>(Collection::Students, uid)?,
        _ => None,
    };
    if let Some(p) = student.as_mut() {
        patch_student(store, p, patch)?;
    }
    let college = match e.role {
        Role::College => colleges::find_by_admin(store, uid),
        _ => None,
    };
    if let (Some(c), Some(new_email)) = (&college, &email) {
        if *new_email != c.data.admin_email {
            colleges::ensure_admin_email_free(store, new_email, Some(c.id.as_str()))?;
        }
    }

    let identity = idp.update_account(uid, email.as_deref(), name.as_deref())?;
    e.email = identity.email.clone();
    if let Some(n) = &name {
        e.name = n.clone();
    }
    store.put(Collection::Users, uid, &e)?;

    match e.role {
        Role::Admin => {
            if let Some(mut p) = store.get_as::<AdminProfile>(Collection::Admins, uid)? {
                p.email = e.email.clone();
                p.name = e.name.clone();
                store.put(Collection::Admins, uid, &p)?;
            }
        }
        Role::Student => {
            if let Some(mut p) = student {
                p.email = e.email.clone();
                p.name = e.name.clone();
                store.put(Collection::Students, uid, &p)?;
            }
        }
        Role::College => {
            if let Some(mut c) = college {
                c.data.admin_email = e.email.clone();
                if name.is_some() {
                    c.data.admin_name = e.name.clone();
                }
                store.put(Collection::Colleges, &c.id, &c.data)?;
            }
        }
    }
    get(store, uid)
}

/// Remove account, profile and directory entry. A college account's college stays,
/// unlinked, so its students and history survive.
pub fn delete(store: &SharedStore, idp: &dyn IdentityProvider, uid: &str) -> AppResult<Role> {
    let e = entry(store, uid)?;
    match e.role {
        Role::Admin => {
            store.delete(Collection::Admins, uid);
        }
        Role::Student => {
            store.delete(Collection::Students, uid);
        }
        Role::College => {
            if let Some(mut c) = colleges::find_by_admin(store, uid) {
                c.data.admin_id = None;
                store.put(Collection::Colleges, &c.id, &c.data)?;
            }
        }
    }
    idp.delete_account(uid)?;
    store.delete(Collection::Users, uid);
    info!(target: "xceliq::data", uid = %uid, role = %e.role, "user deleted");
    Ok(e.role)
}

pub fn reset_password(store: &SharedStore, idp: &dyn IdentityProvider, uid: &str, new_password: &str) -> AppResult<()> {
    entry(store, uid)?;
    idp.set_password(uid, new_password)
}

/// College id a student belongs to, if the uid is a student.
pub fn student_college(store: &SharedStore, uid: &str) -> AppResult<Option<String>> {
    Ok(store.get_as::<StudentProfile>(Collection::Students, uid)?.map(|p| p.college_id))
}

pub fn students_of_college(store: &SharedStore, college_id: &str, branch: Option<&str>, year: Option<&str>) -> Vec<StudentRow> {
    let mut q = Query::new().where_eq("collegeId", college_id).order_by("name", Direction::Asc);
    if let Some(b) = branch.filter(|b| !b.trim().is_empty()) {
        q = q.where_eq("branch", b.trim());
    }
    if let Some(y) = year.filter(|y| !y.trim().is_empty()) {
        q = q.where_eq("year", y.trim());
    }
    or_empty("students of college", store.query_as::<StudentProfile>(Collection::Students, &q))
        .into_iter()
        .map(|s| StudentRow {
            uid: s.id,
            created_at: display_time(&s.data.created_at),
            name: s.data.name,
            email: s.data.email,
            branch: s.data.branch,
            year: s.data.year,
            roll_number: s.data.roll_number,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    Created(UserRow),
    AlreadyAdmin { uid: String },
}

/// Create the first admin account. Re-running with an email that already belongs to
/// an admin is a no-op; an email held by another role is a conflict.
pub fn bootstrap_admin(
    store: &SharedStore,
    idp: &dyn IdentityProvider,
    email: &str,
    password: &str,
    name: &str,
) -> AppResult<BootstrapOutcome> {
    if let Some(existing) = idp.find_by_email(email)? {
        if store.exists(Collection::Admins, &existing.uid) {
            return Ok(BootstrapOutcome::AlreadyAdmin { uid: existing.uid });
        }
        return Err(AppError::conflict("email_in_use", format!("{} is registered with a non-admin role", existing.email)));
    }
    let input = NewUser {
        email: email.to_string(),
        password: password.to_string(),
        name: name.to_string(),
        role: Role::Admin,
        college_id: None,
        branch: None,
        year: None,
        roll_number: None,
        college: None,
    };
    Ok(BootstrapOutcome::Created(create_user(store, idp, &input)?))
}

/// Colleges whose account has not been created yet; exposed for the bootstrap tooling.
pub fn unlinked_colleges(store: &SharedStore) -> Vec<String> {
    or_empty("unlinked colleges", store.query_as::<College>(Collection::Colleges, &Query::all()))
        .into_iter()
        .filter(|c| c.data.admin_id.is_none())
        .map(|c| c.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{new_college, new_student};
    use crate::identity::{LocalIdentityProvider, LoginRequest, RoleResolver};
    use argon2::Params;

    fn setup() -> (SharedStore, LocalIdentityProvider) {
        let store = SharedStore::in_memory("t");
        let idp = LocalIdentityProvider::with_params(store.clone(), Params::new(8, 1, 1, None).unwrap());
        (store, idp)
    }

    fn new_user(role: Role, email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password: "secret1".into(),
            name: "Someone".into(),
            role,
            college_id: None,
            branch: None,
            year: None,
            roll_number: None,
            college: None,
        }
    }

    #[test]
    fn created_users_resolve_to_their_role() {
        let (store, idp) = setup();
        let cid = new_college(&store, "North", "north@x.io");
        let resolver = RoleResolver::new(store.clone());

        let admin = create_user(&store, &idp, &new_user(Role::Admin, "admin@x.io")).unwrap();
        let student = create_user(
            &store,
            &idp,
            &NewUser { college_id: Some(cid.clone()), branch: Some("cse".into()), year: Some("2".into()), ..new_user(Role::Student, "stu@x.io") },
        )
        .unwrap();
        let college = create_user(
            &store,
            &idp,
            &NewUser {
                college: Some(CollegeInput { name: "South".into(), ..Default::default() }),
                ..new_user(Role::College, "south@x.io")
            },
        )
        .unwrap();

        for (row, role) in [(admin, Role::Admin), (student, Role::Student), (college, Role::College)] {
            let ident = idp.sign_in(&LoginRequest { email: row.email.clone(), password: "secret1".into(), ip: None }).unwrap();
            assert_eq!(resolver.resolve(Some(&ident)).role(), Some(role));
        }
        assert_eq!(list(&store, Some(Role::Student), 0, None).len(), 1);
        assert_eq!(list(&store, None, 1, Some(1)).len(), 1);
    }

    #[test]
    fn failed_profile_write_removes_the_account() {
        let (store, idp) = setup();
        let bad = NewUser { college_id: Some("ghost".into()), ..new_user(Role::Student, "s@x.io") };
        assert_eq!(create_user(&store, &idp, &bad).unwrap_err().http_status(), 404);
        assert!(idp.find_by_email("s@x.io").unwrap().is_none());
    }

    #[test]
    fn registration_checks_branch_and_year() {
        let (store, idp) = setup();
        let cid = new_college(&store, "North", "north@x.io");
        let reg = Registration {
            email: "r@x.io".into(),
            password: "secret1".into(),
            name: "Reg".into(),
            college_id: cid.clone(),
            branch: "MECH".into(),
            year: "2".into(),
            roll_number: None,
        };
        assert_eq!(register_student(&store, &idp, &reg).unwrap_err().code_str(), "invalid_branch");
        let ok = Registration { branch: "ECE".into(), ..reg };
        register_student(&store, &idp, &ok).unwrap();
        assert_eq!(students_of_college(&store, &cid, Some("ECE"), None).len(), 1);
        assert!(students_of_college(&store, &cid, Some("CSE"), None).is_empty());
    }

    #[test]
    fn deleting_a_college_account_unlinks_its_college() {
        let (store, idp) = setup();
        let cid = new_college(&store, "North", "north@x.io");
        let row = create_user(&store, &idp, &NewUser { college_id: Some(cid.clone()), ..new_user(Role::College, "north@x.io") }).unwrap();
        assert_eq!(get(&store, &row.uid).unwrap().college_id.as_deref(), Some(cid.as_str()));
        assert_eq!(delete(&store, &idp, &row.uid).unwrap(), Role::College);
        assert!(colleges::get(&store, &cid).unwrap().data.admin_id.is_none());
        assert!(idp.get(&row.uid).unwrap().is_none());
        assert_eq!(unlinked_colleges(&store), vec![cid]);
    }

    #[test]
    fn update_propagates_to_profile() {
        let (store, idp) = setup();
        let row = create_user(&store, &idp, &new_user(Role::Admin, "a@x.io")).unwrap();
        let patch = UserPatch { name: Some("Renamed".into()), email: Some("b@x.io".into()), ..Default::default() };
        let detail = update(&store, &idp, &row.uid, &patch).unwrap();
        assert_eq!(detail.user.email, "b@x.io");
        let profile = store.get_as::<AdminProfile>(Collection::Admins, &row.uid).unwrap().unwrap();
        assert_eq!(profile.name, "Renamed");
        assert_eq!(profile.email, "b@x.io");
    }

    #[test]
    fn second_account_cannot_take_over_a_linked_college() {
        let (store, idp) = setup();
        let cid = new_college(&store, "North", "a@x.io");
        let resolver = RoleResolver::new(store.clone());
        let first = create_user(&store, &idp, &NewUser { college_id: Some(cid.clone()), ..new_user(Role::College, "a@x.io") }).unwrap();

        let err = create_user(&store, &idp, &NewUser { college_id: Some(cid.clone()), ..new_user(Role::College, "b@x.io") }).unwrap_err();
        assert_eq!(err.code_str(), "college_already_linked");
        assert!(idp.find_by_email("b@x.io").unwrap().is_none());

        let ident = idp.sign_in(&LoginRequest { email: first.email.clone(), password: "secret1".into(), ip: None }).unwrap();
        assert_eq!(resolver.resolve(Some(&ident)).role(), Some(Role::College));
        assert_eq!(colleges::get(&store, &cid).unwrap().data.admin_id.as_deref(), Some(first.uid.as_str()));
    }

    #[test]
    fn rejected_student_update_writes_nothing() {
        let (store, idp) = setup();
        let cid = new_college(&store, "North", "north@x.io");
        let row = create_user(
            &store,
            &idp,
            &NewUser { college_id: Some(cid), branch: Some("CSE".into()), year: Some("2".into()), ..new_user(Role::Student, "s@x.io") },
        )
        .unwrap();

        let patch = UserPatch { email: Some("new@x.io".into()), branch: Some("MECH".into()), ..Default::default() };
        assert_eq!(update(&store, &idp, &row.uid, &patch).unwrap_err().code_str(), "invalid_branch");
        assert_eq!(idp.get(&row.uid).unwrap().unwrap().email, "s@x.io");
        assert_eq!(entry(&store, &row.uid).unwrap().email, "s@x.io");
        let profile = store.get_as::<StudentProfile>(Collection::Students, &row.uid).unwrap().unwrap();
        assert_eq!((profile.email.as_str(), profile.branch.as_str()), ("s@x.io", "CSE"));

        let ok = UserPatch { email: Some("new@x.io".into()), branch: Some("ECE".into()), ..Default::default() };
        update(&store, &idp, &row.uid, &ok).unwrap();
        let profile = store.get_as::<StudentProfile>(Collection::Students, &row.uid).unwrap().unwrap();
        assert_eq!((profile.email.as_str(), profile.branch.as_str()), ("new@x.io", "ECE"));
    }

    #[test]
    fn college_account_email_stays_unique_across_colleges() {
        let (store, idp) = setup();
        new_college(&store, "South", "south@x.io");
        let north = new_college(&store, "North", "north@x.io");
        let row = create_user(&store, &idp, &NewUser { college_id: Some(north.clone()), ..new_user(Role::College, "north@x.io") }).unwrap();

        let patch = UserPatch { email: Some("South@x.io".into()), ..Default::default() };
        assert_eq!(update(&store, &idp, &row.uid, &patch).unwrap_err().code_str(), "college_admin_email_in_use");
        assert_eq!(idp.get(&row.uid).unwrap().unwrap().email, "north@x.io");
        assert_eq!(colleges::get(&store, &north).unwrap().data.admin_email, "north@x.io");
    }

    #[test]
    fn profile_rollback_undoes_each_role() {
        let (store, _) = setup();
        let linked = new_college(&store, "North", "north@x.io");
        colleges::link_admin(&store, &linked, "c1", "north@x.io").unwrap();
        let input = NewUser { college_id: Some(linked.clone()), ..new_user(Role::College, "north@x.io") };
        remove_profile(&store, "c1", &input).unwrap();
        assert!(colleges::get(&store, &linked).unwrap().data.admin_id.is_none());

        let created = colleges::create(&store, &CollegeInput { name: "South".into(), admin_email: "south@x.io".into(), ..Default::default() }, Some("c2")).unwrap();
        let input = NewUser { college: Some(CollegeInput::default()), ..new_user(Role::College, "south@x.io") };
        remove_profile(&store, "c2", &input).unwrap();
        assert!(!store.exists(Collection::Colleges, &created.id));

        new_student(&store, "s1", &linked);
        remove_profile(&store, "s1", &new_user(Role::Student, "s1@x.io")).unwrap();
        assert!(!store.exists(Collection::Students, "s1"));
    }

    #[test]
    fn bootstrap_admin_is_idempotent() {
        let (store, idp) = setup();
        let first = bootstrap_admin(&store, &idp, "root@x.io", "secret1", "Root").unwrap();
        let BootstrapOutcome::Created(row) = first else { panic!("expected a new admin") };
        assert_eq!(
            bootstrap_admin(&store, &idp, "ROOT@x.io", "other-pass", "Root").unwrap(),
            BootstrapOutcome::AlreadyAdmin { uid: row.uid }
        );
        assert_eq!(list(&store, Some(Role::Admin), 0, None).len(), 1);

        create_user(&store, &idp, &NewUser { college: Some(CollegeInput { name: "C".into(), ..Default::default() }), ..new_user(Role::College, "c@x.io") }).unwrap();
        assert_eq!(bootstrap_admin(&store, &idp, "c@x.io", "secret1", "C").unwrap_err().http_status(), 409);
    }
}
