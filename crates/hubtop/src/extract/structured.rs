//! Structured extraction from captured search payloads.
//!
//! The search endpoints have shipped several different envelope shapes
//! over time, so the payload is navigated as a generic [`Value`] tree
//! with priority-ordered key fallbacks instead of a fixed serde schema.
//! Extraction is best-effort: malformed entries are skipped, and a
//! payload with no recognizable entry list yields an empty batch.

use serde_json::{Map, Value};

use crate::record::{RepoRecord, absolute_url, group_digits, parse_star_count, split_owner_repo};

/// Candidate keys for the entry list, in priority order.
const ENTRY_LIST_KEYS: [&str; 4] = ["summaries", "results", "data", "items"];

const OWNER_KEYS: [&str; 3] = ["namespace", "publisher", "orgname"];
const NAME_KEYS: [&str; 4] = ["name", "slug", "repo_name", "display_name"];
const PULL_KEYS: [&str; 3] = ["pulls", "pull_count_str", "pull_count"];
const STAR_KEYS: [&str; 2] = ["star_count", "stars"];
const UPDATED_KEYS: [&str; 2] = ["last_updated", "updated_at"];

/// Extract repository records from a search payload of unknown shape.
///
/// Never fails: anything unusable simply contributes no records.
#[must_use]
pub fn extract_records(payload: &Value) -> Vec<RepoRecord> {
    let Some(entries) = find_entry_list(payload) else {
        return Vec::new();
    };

    entries.iter().filter_map(record_from_entry).collect()
}

/// Locate the entry list: first candidate key holding a non-empty array
/// at the top level, then one level deeper inside object values.
fn find_entry_list(payload: &Value) -> Option<&[Value]> {
    let map = payload.as_object()?;

    for key in ENTRY_LIST_KEYS {
        if let Some(Value::Array(list)) = map.get(key)
            && !list.is_empty()
        {
            return Some(list);
        }
    }

    for value in map.values() {
        let Some(inner) = value.as_object() else {
            continue;
        };
        for key in ENTRY_LIST_KEYS {
            if let Some(Value::Array(list)) = inner.get(key)
                && !list.is_empty()
            {
                return Some(list);
            }
        }
    }

    None
}

fn record_from_entry(entry: &Value) -> Option<RepoRecord> {
    let entry = entry.as_object()?;

    let namespace = resolve_text(entry, &OWNER_KEYS);
    let base_name = resolve_text(entry, &NAME_KEYS);
    let (owner, name) = split_owner_repo(&namespace, &base_name);

    // Partial entries are dropped here, never emitted half-filled.
    if owner.is_empty() || name.is_empty() {
        return None;
    }

    let pulls = resolve_pulls(entry);
    let stars = resolve_stars(entry);
    let last_updated = resolve_text(entry, &UPDATED_KEYS);

    let mut link = resolve_text(entry, &["href"]);
    if link.is_empty() {
        link = format!("/r/{owner}/{name}");
    }
    let url = absolute_url(&link);

    Some(RepoRecord {
        name,
        owner,
        pulls,
        stars,
        last_updated,
        url,
    })
}

/// First usable value among `keys`, rendered as text. Empty strings,
/// nulls, and zeros fall through to the next key.
fn resolve_text(entry: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        match entry.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) if !is_zero(n) => return n.to_string(),
            _ => {}
        }
    }
    String::new()
}

/// Pull counts keep their display formatting: numeric values are
/// digit-grouped, strings (e.g. "10M+") pass through verbatim.
fn resolve_pulls(entry: &Map<String, Value>) -> String {
    for key in PULL_KEYS {
        match entry.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) if !is_zero(n) => {
                return match n.as_u64() {
                    Some(v) => group_digits(v),
                    None => n.to_string(),
                };
            }
            _ => {}
        }
    }
    String::new()
}

fn resolve_stars(entry: &Map<String, Value>) -> u64 {
    for key in STAR_KEYS {
        match entry.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.is_empty() => {}
            Some(Value::Number(n)) if is_zero(n) => {}
            Some(value) => return parse_star_count(value),
        }
    }
    0
}

fn is_zero(n: &serde_json::Number) -> bool {
    n.as_f64() == Some(0.0)
}
