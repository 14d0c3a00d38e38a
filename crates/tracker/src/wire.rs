//! Search response wire types and their conversion into [`Incident`]s.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use relay_core::Incident;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::adf;
use crate::conclusion::ConclusionChain;

/// One page of `/rest/api/3/search/jql`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

impl SearchPage {
    /// Token for the next page, or `None` when this is the last one.
    pub fn continuation(&self) -> Option<&str> {
        if self.is_last == Some(true) {
            return None;
        }
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct RawIssue {
    pub key: String,
    /// Kept untyped: custom fields are looked up by id.
    #[serde(default)]
    pub fields: Value,
}

impl RawIssue {
    pub fn into_incident(self, conclusions: &ConclusionChain, synced_at: DateTime<Utc>) -> Incident {
        let fields = &self.fields;
        let text = |pointer: &str| {
            fields
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Incident {
            title: text("/summary"),
            description: adf::to_plain_text(fields.get("description").unwrap_or(&Value::Null)),
            conclusion: conclusions.extract(fields),
            status: text("/status/name"),
            issue_type: text("/issuetype/name"),
            assignee: text("/assignee/displayName"),
            created_at: parse_timestamp(&self.key, "created", fields.get("created")),
            updated_at: parse_timestamp(&self.key, "updated", fields.get("updated")),
            synced_at,
            key: self.key,
        }
    }
}

/// Parse a Jira timestamp.
///
/// Accepts RFC 3339 and Jira's compact offset form
/// (`2024-03-01T10:15:30.000+0000`). Missing or unparsable values fall back
/// to the Unix epoch.
pub fn parse_timestamp(key: &str, field: &str, value: Option<&Value>) -> DateTime<Utc> {
    let raw = value.and_then(Value::as_str).unwrap_or_default();
    match parse_jira_time(raw) {
        Some(ts) => ts,
        None => {
            warn!(incident = %key, field, value = %raw, "unparsable timestamp, using epoch");
            DateTime::<Utc>::default()
        }
    }
}

fn parse_jira_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
