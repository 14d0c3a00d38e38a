//! JQL query construction from [`TrackerConfig`] filters.

use relay_core::config::TrackerConfig;

/// Quote a JQL string literal, escaping embedded quotes and backslashes.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Build the search query for the configured filters.
///
/// Always ordered by most recently updated first.
pub fn build_jql(config: &TrackerConfig) -> String {
    let mut jql = format!("project = {}", quote(&config.project));

    if let Some(status) = config.status.as_deref().filter(|s| !s.trim().is_empty()) {
        jql.push_str(&format!(" AND status = {}", quote(status.trim())));
    }

    let assignees: Vec<&str> = config
        .assignees
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    match assignees.as_slice() {
        [] => {}
        [single] => jql.push_str(&format!(" AND assignee = {}", quote(single))),
        many => {
            let clauses: Vec<String> = many
                .iter()
                .map(|a| format!("assignee = {}", quote(a)))
                .collect();
            jql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }
    }

    if config.current_sprint {
        jql.push_str(" AND sprint in openSprints()");
    }

    jql.push_str(" ORDER BY updated DESC");
    jql
}
