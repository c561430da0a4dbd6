//! Dotted-path filter grammar for participant listing.
//!
//! A filter key has the form `participants.<association>.<attribute>.<operator>`
//! or `participants.<root attribute>.<operator>`. Keys outside the
//! `participants.` namespace are not filters and are ignored. Every part of a
//! recognised key is checked against a closed whitelist, so nothing the client
//! sends ever reaches SQL except as a bound value.

use crate::domains::participant::types::{ColumnType, SubRecordKind};
use crate::errors::{DomainError, DomainResult};

const NAMESPACE: &str = "participants";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    NotEq,
    Cont,
    Start,
}

impl FilterOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(FilterOperator::Eq),
            "not_eq" => Some(FilterOperator::NotEq),
            "cont" => Some(FilterOperator::Cont),
            "start" => Some(FilterOperator::Start),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "not_eq",
            FilterOperator::Cont => "cont",
            FilterOperator::Start => "start",
        }
    }
}

/// What a filter compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// The participant's public identifier
    ExternalId,
    /// An attribute of one of the participant's sub-records
    Association {
        kind: SubRecordKind,
        column: &'static str,
        column_type: ColumnType,
    },
}

/// Bound value of a filter, already shaped for its column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    pub target: FilterTarget,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterExpr {
    /// Pattern for LIKE operators with `%`, `_` and `\` escaped
    pub fn like_pattern(&self) -> Option<String> {
        let text = match &self.value {
            FilterValue::Text(text) => text,
            FilterValue::Flag(_) => return None,
        };
        let escaped = escape_like(text);
        match self.operator {
            FilterOperator::Cont => Some(format!("%{}%", escaped)),
            FilterOperator::Start => Some(format!("{}%", escaped)),
            FilterOperator::Eq | FilterOperator::NotEq => None,
        }
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn invalid(key: &str, reason: &str) -> DomainError {
    DomainError::InvalidFilter(format!("{}: {}", key, reason))
}

fn parse_flag(key: &str, value: &str) -> DomainResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(key, "expected true or false")),
    }
}

/// Parse one query parameter. Returns `Ok(None)` when the key is not a filter.
pub fn parse_filter(key: &str, value: &str) -> DomainResult<Option<FilterExpr>> {
    let mut segments: Vec<&str> = key.split('.').collect();
    if segments.first() != Some(&NAMESPACE) || segments.len() < 2 {
        return Ok(None);
    }
    segments.remove(0);

    let operator_name = segments.pop().unwrap_or_default();
    let operator = FilterOperator::parse(operator_name)
        .ok_or_else(|| invalid(key, &format!("unknown operator '{}'", operator_name)))?;

    let target = match segments.as_slice() {
        ["id"] | ["external_id"] => FilterTarget::ExternalId,
        [association, attribute] => {
            let kind = SubRecordKind::from_association(association)
                .ok_or_else(|| invalid(key, &format!("unknown association '{}'", association)))?;
            let (column, column_type) = kind.column(attribute).ok_or_else(|| {
                invalid(key, &format!("'{}' has no filterable attribute '{}'", association, attribute))
            })?;
            FilterTarget::Association { kind, column, column_type }
        }
        _ => return Err(invalid(key, "malformed filter path")),
    };

    let value = match target {
        FilterTarget::Association { column_type: ColumnType::Bool, .. } => {
            if matches!(operator, FilterOperator::Cont | FilterOperator::Start) {
                return Err(invalid(key, "operator only applies to text attributes"));
            }
            FilterValue::Flag(parse_flag(key, value)?)
        }
        _ => FilterValue::Text(value.to_string()),
    };

    Ok(Some(FilterExpr { target, operator, value }))
}

/// Parse every filter in a query string. All recognised filters are ANDed.
pub fn parse_filters(params: &[(String, String)]) -> DomainResult<Vec<FilterExpr>> {
    let mut filters = Vec::new();
    for (key, value) in params {
        if let Some(expr) = parse_filter(key, value)? {
            filters.push(expr);
        }
    }
    Ok(filters)
}
