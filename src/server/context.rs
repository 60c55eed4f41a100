use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{AppError, AppResult};
use crate::identity::{require_any, require_role, require_session, Role, Session, SessionState, SessionUser};

use super::{parse_cookie, AppState, CSRF_HEADER, SESSION_COOKIE};

/// Per-request view of the caller: the cookie's session (if live), the resolved
/// role state and the CSRF header. Never rejects; handlers decide what they need.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: Option<Session>,
    pub state: SessionState,
    csrf_header: Option<String>,
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, app: &AppState) -> Result<Self, Self::Rejection> {
        let session = parse_cookie(&parts.headers, SESSION_COOKIE).and_then(|t| app.sessions.validate(&t));
        let state = app.resolver.resolve(session.as_ref().map(|s| &s.identity));
        let csrf_header = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Ok(RequestContext { session, state, csrf_header })
    }
}

impl RequestContext {
    pub fn user(&self) -> AppResult<&SessionUser> { require_session(&self.state) }

    pub fn role(&self, role: Role) -> AppResult<&SessionUser> { require_role(&self.state, role) }

    pub fn any_of(&self, roles: &[Role]) -> AppResult<&SessionUser> { require_any(&self.state, roles) }

    /// Gate for mutating requests: a live session whose CSRF token matches the header.
    pub fn csrf(&self) -> AppResult<()> {
        let Some(sess) = &self.session else {
            return Err(AppError::auth("no_session", "sign in to continue"));
        };
        match self.csrf_header.as_deref() {
            Some(provided) if provided == sess.csrf_token => Ok(()),
            _ => Err(AppError::forbidden("invalid_csrf", "missing or invalid CSRF token")),
        }
    }

    /// CSRF check followed by an exact role match.
    pub fn mutate_as(&self, role: Role) -> AppResult<&SessionUser> {
        self.csrf()?;
        self.role(role)
    }
}
