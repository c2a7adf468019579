//! Sort order for record listings

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::Record;
use crate::error::Error;

/// Field + direction, written `-field` (descending) or `field` (ascending)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Sort records in place; records missing the field sort first when ascending
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|left, right| {
            let ordering = compare_values(
                left.field(&self.field).as_ref(),
                right.field(&self.field).as_ref(),
            );
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::descending("updated_date")
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

impl FromStr for SortSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (descending, field) = match trimmed.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        if field.is_empty() {
            return Err(Error::InvalidInput("sort field cannot be empty".into()));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(l)), Some(Value::Number(r))) => {
            match (l.as_i64(), r.as_i64()) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => l
                    .as_f64()
                    .partial_cmp(&r.as_f64())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        (Some(Value::Bool(l)), Some(Value::Bool(r))) => l.cmp(r),
        (Some(l), Some(r)) => type_rank(l).cmp(&type_rank(r)),
    }
}
