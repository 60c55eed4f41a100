use serde::Serialize;
use tracing::{debug, error};

use crate::model::{AdminProfile, College, StudentProfile};
use crate::store::{Collection, Query, SharedStore, StoreError};

use super::principal::{Identity, Role, SessionUser};

/// Client-visible phases of the signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Role lookups still in flight; protected pages must not render yet.
    Resolving,
    Anonymous,
    Authenticated { user: SessionUser },
}

impl SessionState {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionState::Authenticated { user } => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> { self.user().map(|u| u.role) }
}

/// Classifies an identity into exactly one role by probing the profile collections
/// in a fixed order: admins by uid, students by uid, colleges by `adminId`, colleges
/// by `adminEmail`. The first hit wins. Nothing is cached between calls.
#[derive(Clone)]
pub struct RoleResolver {
    store: SharedStore,
}

impl RoleResolver {
    pub fn new(store: SharedStore) -> Self { Self { store } }

    pub fn resolve(&self, identity: Option<&Identity>) -> SessionState {
        let Some(identity) = identity else { return SessionState::Anonymous; };
        match self.probe(identity) {
            Ok(Some(user)) => {
                debug!(target: "xceliq::identity", uid = %user.uid, role = %user.role, "session resolved");
                SessionState::Authenticated { user }
            }
            Ok(None) => {
                debug!(target: "xceliq::identity", uid = %identity.uid, "no profile for identity");
                SessionState::Anonymous
            }
            Err(e) => {
                error!(target: "xceliq::identity", uid = %identity.uid, "role resolution failed: {}", e);
                SessionState::Anonymous
            }
        }
    }

    fn probe(&self, identity: &Identity) -> Result<Option<SessionUser>, StoreError> {
        if let Some(admin) = self.store.get_as::<AdminProfile>(Collection::Admins, &identity.uid)? {
            return Ok(Some(SessionUser {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
                role: Role::Admin,
                name: admin.name,
                college_id: None,
            }));
        }
        if let Some(student) = self.store.get_as::<StudentProfile>(Collection::Students, &identity.uid)? {
            return Ok(Some(SessionUser {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
                role: Role::Student,
                name: student.name,
                college_id: Some(student.college_id),
            }));
        }
        let by_id = Query::new().where_eq("adminId", identity.uid.as_str()).limit(1);
        let by_email = Query::new().where_eq("adminEmail", identity.email.as_str()).limit(1);
        for q in [by_id, by_email] {
            if let Some(college) = self.store.query_as::<College>(Collection::Colleges, &q)?.into_iter().next() {
                return Ok(Some(SessionUser {
                    uid: identity.uid.clone(),
                    email: identity.email.clone(),
                    role: Role::College,
                    name: college.data.name,
                    college_id: Some(college.id),
                }));
            }
        }
        Ok(None)
    }
}
