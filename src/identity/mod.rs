//! Identity, sessions and role resolution.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod guard;
mod principal;
mod provider;
mod resolver;
mod session;

pub use authorizer::{require_any, require_college_scope, require_role, require_session};
pub use guard::{GuardDecision, Notice, NoticeLevel, RouteGuard, LOGIN_ROUTE};
pub use principal::{Identity, Role, SessionUser};
pub use provider::{
    normalize_email, validate_email, validate_password, IdentityProvider, LocalIdentityProvider, LoginRequest,
    MIN_PASSWORD_LEN,
};
pub use resolver::{RoleResolver, SessionState};
pub use session::{Session, SessionManager, SessionToken};
