use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value as JsonValue;

use super::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value. A missing field never matches.
    Eq(String, JsonValue),
    /// Field is an array holding the value.
    ArrayContains(String, JsonValue),
    /// Field equals one of the values.
    In(String, Vec<JsonValue>),
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, want) => doc.get(field).map(|v| v == want).unwrap_or(false),
            Filter::ArrayContains(field, want) => doc
                .get(field)
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().any(|v| v == want))
                .unwrap_or(false),
            Filter::In(field, wants) => doc.get(field).map(|v| wants.iter().any(|w| w == v)).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Conjunctive filter list with optional ordering and offset/limit paging.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    offset: usize,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self { Self::default() }

    /// Every document in the collection.
    pub fn all() -> Self { Self::default() }

    pub fn where_eq<F: Into<String>, V: Into<JsonValue>>(mut self, field: F, value: V) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn array_contains<F: Into<String>, V: Into<JsonValue>>(mut self, field: F, value: V) -> Self {
        self.filters.push(Filter::ArrayContains(field.into(), value.into()));
        self
    }

    pub fn where_in<F: Into<String>, V: Into<JsonValue>>(mut self, field: F, values: Vec<V>) -> Self {
        self.filters.push(Filter::In(field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn order_by<F: Into<String>>(mut self, field: F, dir: Direction) -> Self {
        self.order_by = Some((field.into(), dir));
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn filters(&self) -> &[Filter] { &self.filters }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Apply ordering then paging to already-filtered rows.
    pub(crate) fn finish(&self, mut rows: Vec<(String, Document)>) -> Vec<(String, Document)> {
        if let Some((field, dir)) = &self.order_by {
            // stable sort keeps id order between equal keys
            rows.sort_by(|(_, a), (_, b)| {
                let ord = compare_values(a.get(field), b.get(field));
                match dir {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }
}

fn type_rank(v: &JsonValue) -> u8 {
    match v {
        JsonValue::Null => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Object(_) => 5,
    }
}

/// Total order over optional JSON values; missing fields sort first.
fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (JsonValue::Number(x), JsonValue::Number(y)) => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (JsonValue::String(x), JsonValue::String(y)) => {
                // timestamps are stored as RFC 3339 with variable sub-second digits
                match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                    (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                    _ => x.cmp(y),
                }
            }
            (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
            _ => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: JsonValue) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn eq_and_array_contains() {
        let d = doc(json!({"collegeId": "c1", "games": ["g1", "g2"]}));
        assert!(Query::new().where_eq("collegeId", "c1").matches(&d));
        assert!(!Query::new().where_eq("collegeId", "c2").matches(&d));
        assert!(Query::new().array_contains("games", "g2").matches(&d));
        assert!(!Query::new().array_contains("games", "g3").matches(&d));
        assert!(!Query::new().where_eq("missing", JsonValue::Null).matches(&d));
        assert!(Query::new().where_in("collegeId", vec!["c0", "c1"]).matches(&d));
    }

    #[test]
    fn order_offset_limit() {
        let rows = vec![
            ("a".to_string(), doc(json!({"score": 5}))),
            ("b".to_string(), doc(json!({"score": 9}))),
            ("c".to_string(), doc(json!({}))),
            ("d".to_string(), doc(json!({"score": 7}))),
        ];
        let out = Query::new().order_by("score", Direction::Desc).offset(1).limit(2).finish(rows);
        let ids: Vec<&str> = out.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a"]);
    }
}
