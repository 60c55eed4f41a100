use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::store::{Collection, Query, SharedStore};

use super::principal::Identity;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email regex")
});

/// Account record kept in the provider's private collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    disabled: bool,
    created_at: DateTime<Utc>,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity { uid: self.uid.clone(), email: self.email.clone(), display_name: self.display_name.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub ip: Option<String>,
}

/// Email/password identity provider. Knows nothing about roles.
pub trait IdentityProvider: Send + Sync {
    fn create_account(&self, email: &str, password: &str, display_name: &str) -> AppResult<Identity>;
    fn sign_in(&self, req: &LoginRequest) -> AppResult<Identity>;
    fn get(&self, uid: &str) -> AppResult<Option<Identity>>;
    fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>>;
    fn update_account(&self, uid: &str, email: Option<&str>, display_name: Option<&str>) -> AppResult<Identity>;
    fn set_password(&self, uid: &str, password: &str) -> AppResult<()>;
    fn delete_account(&self, uid: &str) -> AppResult<bool>;
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_email(email: &str) -> AppResult<String> {
    let e = normalize_email(email);
    if !EMAIL_RE.is_match(&e) {
        return Err(AppError::user("invalid_email", format!("'{}' is not a valid email address", email.trim())));
    }
    Ok(e)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::user("weak_password", format!("password must be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}

/// Provider backed by the `authAccounts` collection with argon2 PHC hashes.
pub struct LocalIdentityProvider {
    store: SharedStore,
    hasher: Argon2<'static>,
}

impl LocalIdentityProvider {
    pub fn new(store: SharedStore) -> Self {
        Self { store, hasher: Argon2::default() }
    }

    /// Use explicit argon2 cost parameters (tests and tooling use cheap ones).
    pub fn with_params(store: SharedStore, params: Params) -> Self {
        Self { store, hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) }
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("rng_failed", e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("salt_failed", e.to_string()))?;
        let phc = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal("hash_failed", e.to_string()))?
            .to_string();
        Ok(phc)
    }

    fn verify_password(&self, hash: &str, password: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.hasher.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    fn account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let q = Query::new().where_eq("email", normalize_email(email)).limit(1);
        let mut rows = self.store.query_as::<Account>(Collection::AuthAccounts, &q)?;
        Ok(rows.pop().map(|s| s.data))
    }

    fn account(&self, uid: &str) -> AppResult<Account> {
        self.store
            .get_as::<Account>(Collection::AuthAccounts, uid)?
            .ok_or_else(|| AppError::not_found("user_not_found", format!("no account with uid {}", uid)))
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn create_account(&self, email: &str, password: &str, display_name: &str) -> AppResult<Identity> {
        let email = validate_email(email)?;
        validate_password(password)?;
        if self.account_by_email(&email)?.is_some() {
            return Err(AppError::conflict("email_in_use", format!("an account already exists for {}", email)));
        }
        let account = Account {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email,
            password_hash: self.hash_password(password)?,
            display_name: display_name.trim().to_string(),
            disabled: false,
            created_at: Utc::now(),
        };
        self.store.put(Collection::AuthAccounts, &account.uid, &account)?;
        info!(target: "xceliq::identity", uid = %account.uid, "account created for {}", account.email);
        Ok(account.identity())
    }

    fn sign_in(&self, req: &LoginRequest) -> AppResult<Identity> {
        let invalid = || AppError::auth("invalid_credentials", "email or password is incorrect");
        let Some(account) = self.account_by_email(&req.email)? else { return Err(invalid()); };
        if !self.verify_password(&account.password_hash, &req.password) {
            debug!(target: "xceliq::identity", uid = %account.uid, ip = ?req.ip, "password mismatch");
            return Err(invalid());
        }
        if account.disabled {
            return Err(AppError::forbidden("account_disabled", "this account has been disabled"));
        }
        Ok(account.identity())
    }

    fn get(&self, uid: &str) -> AppResult<Option<Identity>> {
        Ok(self.store.get_as::<Account>(Collection::AuthAccounts, uid)?.map(|a| a.identity()))
    }

    fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        Ok(self.account_by_email(email)?.map(|a| a.identity()))
    }

    fn update_account(&self, uid: &str, email: Option<&str>, display_name: Option<&str>) -> AppResult<Identity> {
        let mut account = self.account(uid)?;
        if let Some(e) = email {
            let e = validate_email(e)?;
            if e != account.email {
                if let Some(other) = self.account_by_email(&e)? {
                    if other.uid != uid {
                        return Err(AppError::conflict("email_in_use", format!("an account already exists for {}", e)));
                    }
                }
                account.email = e;
            }
        }
        if let Some(n) = display_name {
            account.display_name = n.trim().to_string();
        }
        self.store.put(Collection::AuthAccounts, uid, &account)?;
        Ok(account.identity())
    }

    fn set_password(&self, uid: &str, password: &str) -> AppResult<()> {
        validate_password(password)?;
        let mut account = self.account(uid)?;
        account.password_hash = self.hash_password(password)?;
        self.store.put(Collection::AuthAccounts, uid, &account)?;
        info!(target: "xceliq::identity", uid = %uid, "password updated");
        Ok(())
    }

    fn delete_account(&self, uid: &str) -> AppResult<bool> {
        Ok(self.store.delete(Collection::AuthAccounts, uid))
    }
}
