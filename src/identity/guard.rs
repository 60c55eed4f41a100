use std::time::Duration;

use serde::Serialize;

use super::principal::Role;
use super::resolver::SessionState;

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Toast shown alongside a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still resolving; keep the page blocked.
    Pending,
    Allow,
    Redirect { to: String, delay_ms: u64, notice: Notice },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool { matches!(self, GuardDecision::Allow) }
}

/// Gates a page on an exact role match. There is no role hierarchy: an admin is
/// redirected away from a student page like anyone else.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    redirect_delay: Duration,
}

impl Default for RouteGuard {
    fn default() -> Self { Self::new(Duration::from_millis(1500)) }
}

impl RouteGuard {
    pub fn new(redirect_delay: Duration) -> Self { Self { redirect_delay } }

    pub fn check(&self, state: &SessionState, required: Role) -> GuardDecision {
        let delay_ms = self.redirect_delay.as_millis() as u64;
        match state {
            SessionState::Resolving => GuardDecision::Pending,
            SessionState::Anonymous => GuardDecision::Redirect {
                to: LOGIN_ROUTE.to_string(),
                delay_ms,
                notice: Notice { level: NoticeLevel::Info, message: "Please sign in to continue".into() },
            },
            SessionState::Authenticated { user } if user.role == required => GuardDecision::Allow,
            SessionState::Authenticated { user } => GuardDecision::Redirect {
                to: user.role.home_route().to_string(),
                delay_ms,
                notice: Notice {
                    level: NoticeLevel::Error,
                    message: format!("Access denied: this page requires the {} role", required),
                },
            },
        }
    }
}
