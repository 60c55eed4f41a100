use crate::error::{AppError, AppResult};

use super::guard::{GuardDecision, RouteGuard};
use super::principal::{Role, SessionUser};
use super::resolver::SessionState;

fn unauthenticated() -> AppError {
    AppError::auth("no_session", "sign in to continue")
}

pub fn require_session(state: &SessionState) -> AppResult<&SessionUser> {
    state.user().ok_or_else(unauthenticated)
}

/// API counterpart of the route guard: the same exact-match rule, mapped to 401/403.
pub fn require_role(state: &SessionState, role: Role) -> AppResult<&SessionUser> {
    match RouteGuard::default().check(state, role) {
        GuardDecision::Allow => require_session(state),
        GuardDecision::Pending => Err(AppError::auth("session_resolving", "session is still being resolved")),
        GuardDecision::Redirect { .. } => match state.user() {
            None => Err(unauthenticated()),
            Some(user) => Err(AppError::forbidden(
                "role_mismatch",
                format!("{} role required, signed in as {}", role, user.role),
            )),
        },
    }
}

pub fn require_any<'a>(state: &'a SessionState, roles: &[Role]) -> AppResult<&'a SessionUser> {
    let user = require_session(state)?;
    if roles.contains(&user.role) {
        Ok(user)
    } else {
        let wanted: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        Err(AppError::forbidden("role_mismatch", format!("one of [{}] required, signed in as {}", wanted.join(", "), user.role)))
    }
}

/// Admins may act on any college; a college account only on its own.
pub fn require_college_scope(user: &SessionUser, college_id: &str) -> AppResult<()> {
    match user.role {
        Role::Admin => Ok(()),
        Role::College if user.college_id.as_deref() == Some(college_id) => Ok(()),
        _ => Err(AppError::forbidden("college_scope", "not permitted for this college")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(role: Role, college: Option<&str>) -> SessionState {
        SessionState::Authenticated {
            user: SessionUser {
                uid: "u".into(),
                email: "u@x.io".into(),
                role,
                name: String::new(),
                college_id: college.map(str::to_string),
            },
        }
    }

    #[test]
    fn require_role_maps_to_http_classes() {
        assert!(require_role(&state(Role::Admin, None), Role::Admin).is_ok());
        assert_eq!(require_role(&state(Role::Student, None), Role::Admin).unwrap_err().http_status(), 403);
        assert_eq!(require_role(&SessionState::Anonymous, Role::Admin).unwrap_err().http_status(), 401);
    }

    #[test]
    fn college_scope() {
        let s = state(Role::College, Some("c1"));
        let u = s.user().unwrap();
        assert!(require_college_scope(u, "c1").is_ok());
        assert!(require_college_scope(u, "c2").is_err());
        let a = state(Role::Admin, None);
        assert!(require_college_scope(a.user().unwrap(), "c2").is_ok());
        let st = state(Role::Student, Some("c1"));
        assert!(require_college_scope(st.user().unwrap(), "c1").is_err());
    }

    #[test]
    fn require_any_accepts_listed_roles() {
        let s = state(Role::College, Some("c1"));
        assert_eq!(require_any(&s, &[Role::Admin, Role::College]).unwrap().uid, "u");
        assert_eq!(require_any(&s, &[Role::Admin]).unwrap_err().http_status(), 403);
        assert_eq!(require_any(&SessionState::Anonymous, &[Role::Admin]).unwrap_err().http_status(), 401);
    }
}
