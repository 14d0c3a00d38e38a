use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::config::TrackerConfig;
use relay_core::traits::SnapshotSource;
use relay_core::{Incident, SyncError};
use tracing::{debug, info};

use crate::conclusion::ConclusionChain;
use crate::error::TrackerError;
use crate::jql::build_jql;
use crate::wire::SearchPage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 50;
const BASE_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "issuetype",
    "assignee",
    "resolution",
    "created",
    "updated",
];

/// Jira Cloud REST v3 search client.
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
    jql: String,
    fields: String,
    conclusions: ConclusionChain,
}

impl JiraClient {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| TrackerError::NotConfigured("JIRA_API_TOKEN".into()))?;
        if config.url.is_empty() {
            return Err(TrackerError::NotConfigured("JIRA_URL".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let conclusions = ConclusionChain::from_fields(&config.conclusion_fields);
        let fields = BASE_FIELDS
            .iter()
            .copied()
            .chain(conclusions.requested_fields())
            .collect::<Vec<_>>()
            .join(",");

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token,
            jql: build_jql(config),
            fields,
            conclusions,
        })
    }

    pub fn jql(&self) -> &str {
        &self.jql
    }

    /// Link to an incident in the Jira UI.
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<SearchPage, TrackerError> {
        let url = format!("{}/rest/api/3/search/jql", self.base_url);
        let max_results = PAGE_SIZE.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("jql", self.jql.as_str()),
            ("maxResults", max_results.as_str()),
            ("fields", self.fields.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("nextPageToken", token));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TrackerError::Parse(e.to_string()))
    }

    /// Fetch every matching issue, following `nextPageToken`.
    pub async fn search(&self) -> Result<Vec<Incident>, TrackerError> {
        let synced_at = Utc::now();
        let mut incidents = Vec::new();
        let mut token: Option<String> = None;

        for page_no in 1..=MAX_PAGES {
            let page = self.fetch_page(token.as_deref()).await?;
            let next = page.continuation().map(str::to_string);
            debug!(page = page_no, issues = page.issues.len(), "fetched search page");

            incidents.extend(
                page.issues
                    .into_iter()
                    .map(|issue| issue.into_incident(&self.conclusions, synced_at)),
            );

            match next {
                Some(t) => token = Some(t),
                None => {
                    info!(incidents = incidents.len(), pages = page_no, "jira search complete");
                    return Ok(incidents);
                }
            }
        }

        Err(TrackerError::PageLimit(MAX_PAGES))
    }
}

#[async_trait]
impl SnapshotSource for JiraClient {
    async fn fetch_all(&self) -> Result<Vec<Incident>, SyncError> {
        Ok(self.search().await?)
    }
}
