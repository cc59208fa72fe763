// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload filter evaluation for the in-process engine.

use chrono::{DateTime, Utc};
use chronofact_core::vector::{Condition, Filter};

/// Evaluate a filter tree against a point payload.
///
/// Every `must` condition has to hold; when `should` is non-empty at least
/// one of them has to hold as well.
pub fn matches(filter: &Filter, payload: &serde_json::Value) -> bool {
    if !filter.must.iter().all(|c| condition_matches(c, payload)) {
        return false;
    }
    if !filter.should.is_empty() && !filter.should.iter().any(|c| condition_matches(c, payload)) {
        return false;
    }
    true
}

fn condition_matches(condition: &Condition, payload: &serde_json::Value) -> bool {
    match condition {
        Condition::MatchText { key, value } => payload
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == value),
        Condition::MatchBool { key, value } => payload
            .get(key)
            .and_then(|v| v.as_bool())
            .is_some_and(|b| b == *value),
        Condition::Range { key, gte, lte } => {
            let Some(number) = payload.get(key).and_then(|v| v.as_f64()) else {
                return false;
            };
            gte.is_none_or(|lo| number >= lo) && lte.is_none_or(|hi| number <= hi)
        }
        Condition::DatetimeRange { key, gte, lte } => {
            let Some(ts) = payload
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(parse_rfc3339)
            else {
                return false;
            };
            gte.is_none_or(|lo| ts >= lo) && lte.is_none_or(|hi| ts <= hi)
        }
        Condition::AnyOf { key, values } => payload
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| values.iter().any(|v| v == s)),
        Condition::Nested(inner) => matches(inner, payload),
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}
