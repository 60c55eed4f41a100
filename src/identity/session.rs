use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::Identity;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    /// Per-session token echoed back in `x-csrf-token` on mutating requests.
    pub csrf_token: String,
    pub identity: Identity,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> AppResult<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("rng_failed", e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Issued sign-in sessions keyed by token. Only the identity is stored; the role is
/// re-resolved from the profile collections on every request.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    user_index: RwLock<HashMap<String, HashSet<SessionToken>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), user_index: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, identity: Identity) -> AppResult<Session> {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_id()?,
            token: gen_id()?,
            csrf_token: gen_id()?,
            identity: identity.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.token.clone(), sess.clone());
        self.user_index
            .write()
            .entry(identity.uid.clone())
            .or_default()
            .insert(sess.token.clone());
        tprintln!("session.issue uid={} sid={} ttl_secs={}", identity.uid, sess.session_id, self.ttl.as_secs());
        Ok(sess)
    }

    /// Return the live session for a token, dropping it if expired.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.logout(token);
        }
        None
    }

    pub fn check_csrf(&self, token: &str, provided: &str) -> bool {
        self.validate(token).map(|s| s.csrf_token == provided).unwrap_or(false)
    }

    pub fn logout(&self, token: &str) -> bool {
        let Some(sess) = self.sessions.write().remove(token) else { return false; };
        if let Some(set) = self.user_index.write().get_mut(&sess.identity.uid) {
            set.remove(token);
        }
        true
    }

    /// Drop every session of a user, e.g. after deletion or a password reset.
    pub fn revoke_user(&self, uid: &str) -> usize {
        let tokens = self.user_index.write().remove(uid).unwrap_or_default();
        let mut sessions = self.sessions.write();
        let count = tokens.iter().filter(|t| sessions.remove(*t).is_some()).count();
        tprintln!("session.revoke uid={} count={}", uid, count);
        count
    }

    /// Drop every expired session whether or not its token is ever presented again.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write();
            let tokens: Vec<SessionToken> =
                sessions.iter().filter(|(_, s)| s.expires_at <= now).map(|(t, _)| t.clone()).collect();
            tokens.iter().filter_map(|t| sessions.remove(t)).collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut index = self.user_index.write();
        for sess in &expired {
            if let Some(set) = index.get_mut(&sess.identity.uid) {
                set.remove(&sess.token);
                if set.is_empty() {
                    index.remove(&sess.identity.uid);
                }
            }
        }
        tprintln!("session.sweep count={}", expired.len());
        expired.len()
    }

    pub fn active_count(&self) -> usize { self.sessions.read().len() }

    pub fn indexed_users(&self) -> usize { self.user_index.read().len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(uid: &str) -> Identity {
        Identity { uid: uid.into(), email: format!("{}@x.io", uid), display_name: String::new() }
    }

    #[test]
    fn issue_validate_logout() {
        let sm = SessionManager::default();
        let s = sm.issue(ident("u1")).unwrap();
        assert_eq!(sm.validate(&s.token).unwrap().identity.uid, "u1");
        assert!(sm.check_csrf(&s.token, &s.csrf_token));
        assert!(!sm.check_csrf(&s.token, "forged"));
        assert!(sm.logout(&s.token));
        assert!(sm.validate(&s.token).is_none());
        assert!(!sm.logout(&s.token));
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let sm = SessionManager::new(Duration::from_millis(0));
        let s = sm.issue(ident("u1")).unwrap();
        assert!(sm.validate(&s.token).is_none());
        assert_eq!(sm.active_count(), 0);
    }

    #[test]
    fn revoke_user_drops_all_tokens() {
        let sm = SessionManager::default();
        sm.issue(ident("u1")).unwrap();
        sm.issue(ident("u1")).unwrap();
        let other = sm.issue(ident("u2")).unwrap();
        assert_eq!(sm.revoke_user("u1"), 2);
        assert!(sm.validate(&other.token).is_some());
    }

    #[test]
    fn sweep_drops_abandoned_sessions() {
        let sm = SessionManager::new(Duration::from_millis(0));
        for i in 0..1000 {
            sm.issue(ident(&format!("u{}", i % 10))).unwrap();
        }
        assert_eq!(sm.sweep_expired(), 1000);
        assert_eq!(sm.active_count(), 0);
        assert_eq!(sm.indexed_users(), 0);
        assert_eq!(sm.sweep_expired(), 0);
    }

    #[test]
    fn sweep_keeps_live_sessions() {
        let sm = SessionManager::default();
        let s = sm.issue(ident("u1")).unwrap();
        assert_eq!(sm.sweep_expired(), 0);
        assert!(sm.validate(&s.token).is_some());
    }

    #[test]
    fn issued_tokens_are_distinct() {
        let sm = SessionManager::default();
        let a = sm.issue(ident("u1")).unwrap();
        let b = sm.issue(ident("u2")).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.token, a.csrf_token);
        assert_eq!(a.token.len(), 43);
    }
}
