use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A college tenant. The college account is linked through `admin_id` (uid) and,
/// for accounts created before the uid link existed, `admin_email`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct College {
    pub name: String,
    #[serde(default)]
    pub admin_id: Option<String>,
    pub admin_email: String,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub years: Vec<String>,
    #[serde(default)]
    pub games_assigned: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl College {
    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b.eq_ignore_ascii_case(branch))
    }

    pub fn has_year(&self, year: &str) -> bool {
        self.years.iter().any(|y| y.eq_ignore_ascii_case(year))
    }
}
