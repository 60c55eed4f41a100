//! Data-access helpers, one module per entity.
//!
//! Each helper translates a page/API need into store queries (equality filters,
//! `array-contains`, collection scans) and reshapes the result for display:
//! timestamps become strings and missing fields fall back to defaults.
//!
//! Error policy: list and aggregate reads log failures and fall back to empty
//! results so a single malformed document cannot blank a dashboard; mutations
//! and point reads return [`AppResult`](crate::error::AppResult).

pub mod assessments;
pub mod attempts;
pub mod colleges;
pub mod games;
pub mod reports;
pub mod stats;
pub mod users;

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::store::StoreError;

/// Log a failed list read and substitute an empty list.
pub(crate) fn or_empty<T>(what: &str, res: Result<Vec<T>, StoreError>) -> Vec<T> {
    match res {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "xceliq::data", "{} failed, returning empty: {}", what, e);
            Vec::new()
        }
    }
}

pub(crate) fn required(field: &str, value: &str) -> AppResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::user("missing_field", format!("{} is required", field)));
    }
    Ok(v.to_string())
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order.
pub(crate) fn clean_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let t = item.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures;
