//! Canonical record model for one repository listing.

use serde::Serialize;
use serde_json::Value;

/// Origin that relative repository links are resolved against.
pub const HUB_ORIGIN: &str = "https://hub.docker.com";

/// One repository listing extracted from the Docker Hub search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRecord {
    /// Bare repository name, e.g. "nginx". Never contains a slash.
    pub name: String,
    /// Namespace the repository belongs to, e.g. "library".
    pub owner: String,
    /// Display-formatted pull count, e.g. "10M+" or "12,345,678".
    ///
    /// Upstream mixes abbreviated and exact figures, so this is passed
    /// through as text rather than renormalized to one numeric scale.
    pub pulls: String,
    pub stars: u64,
    /// Opaque timestamp text, passed through verbatim.
    pub last_updated: String,
    /// Absolute address of the repository page.
    pub url: String,
}

impl RepoRecord {
    /// Deduplication identity: the exact-match (owner, name) pair.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.owner.clone(), self.name.clone())
    }
}

/// Split a namespace + name pair into (owner, repo), ensuring the repo
/// name never carries a slash.
///
/// Upstream sometimes ships a combined `"namespace/name"` in the name
/// field; the portion before the first slash wins over an explicit
/// namespace in that case.
#[must_use]
pub fn split_owner_repo(namespace: &str, name: &str) -> (String, String) {
    let namespace = namespace.trim_matches('/');
    let name = name.trim_matches('/');

    match name.split_once('/') {
        Some((owner, repo)) => (owner.to_string(), repo.to_string()),
        None => (namespace.to_string(), name.to_string()),
    }
}

/// Parse a star count from a numeric or comma-grouped string value.
///
/// Anything unparseable maps to 0, never to an error.
#[must_use]
pub fn parse_star_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0),
        _ => 0,
    }
}

/// Render an integer with digit grouping: `1000000000` → `"1,000,000,000"`.
#[must_use]
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Resolve a possibly relative link against the Hub origin.
#[must_use]
pub fn absolute_url(link: &str) -> String {
    if link.starts_with('/') {
        format!("{HUB_ORIGIN}{link}")
    } else {
        link.to_string()
    }
}
