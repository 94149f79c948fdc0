// * Issue tracker client (Jira REST v2)
// * Basic auth with username + API token; reachability via /rest/api/2/serverInfo

use crate::config::TrackerSection;
use crate::engine::readiness::{ProbeFuture, ReadinessProbe};
use crate::network::auth::Credentials;
use crate::network::client::ServiceClient;
use crate::network::errors::ClientError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const SERVER_INFO_PATH: &str = "/rest/api/2/serverInfo";
const ISSUE_PATH: &str = "/rest/api/2/issue";
const SEARCH_PATH: &str = "/rest/api/2/search";
const ISSUE_TYPE_PATH: &str = "/rest/api/2/issuetype";
const PROJECT_PATH: &str = "/rest/api/2/project";
const SEARCH_FIELDS: &str =
    "summary,description,status,issuetype,priority,assignee,reporter,created,updated,labels,components,project";

// * Bucket name for tickets without an assignee
pub const UNASSIGNED: &str = "Unassigned";

/// A ticket flattened out of the tracker's issue representation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub key: String,
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_type: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub created: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub project_key: String,
}

/// Ticket counts grouped by the fields teams usually slice on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketAnalysis {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_assignee: BTreeMap<String, usize>,
    pub by_project: BTreeMap<String, usize>,
    pub unique_labels: Vec<String>,
    pub unique_components: Vec<String>,
}

/// A project visible to the configured account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    key: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    fields: RawFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFields {
    summary: Option<String>,
    description: Option<String>,
    status: Option<Named>,
    issuetype: Option<Named>,
    priority: Option<Named>,
    assignee: Option<Person>,
    reporter: Option<Person>,
    created: Option<String>,
    updated: Option<String>,
    labels: Vec<String>,
    components: Vec<Named>,
    project: Option<Keyed>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Keyed {
    #[serde(default)]
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

// * Accepts RFC 3339 and the tracker's own "+0000" offset form
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

impl From<RawIssue> for Ticket {
    fn from(issue: RawIssue) -> Self {
        let fields = issue.fields;
        Ticket {
            key: issue.key,
            id: issue.id,
            summary: fields.summary.unwrap_or_default(),
            description: fields.description,
            status: fields.status.map(|s| s.name).unwrap_or_default(),
            issue_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
            priority: fields.priority.map(|p| p.name),
            assignee: fields.assignee.map(|a| a.display_name),
            reporter: fields.reporter.map(|r| r.display_name),
            created: fields.created.as_deref().and_then(parse_timestamp),
            updated: fields.updated.as_deref().and_then(parse_timestamp),
            labels: fields.labels,
            components: fields.components.into_iter().map(|c| c.name).collect(),
            project_key: fields.project.map(|p| p.key).unwrap_or_default(),
        }
    }
}

/// Issue tracker API client
pub struct TrackerClient {
    http: ServiceClient,
}

impl TrackerClient {
    pub fn new(section: &TrackerSection) -> Result<Self, ClientError> {
        let base_url = section
            .base_url
            .as_deref()
            .ok_or(ClientError::MissingSetting("tracker.base_url"))?;
        let username = section
            .username
            .as_deref()
            .ok_or(ClientError::MissingSetting("tracker.username"))?;
        let api_token = section
            .api_token
            .as_ref()
            .ok_or(ClientError::MissingSetting("tracker.api_token"))?;

        let credentials = Credentials::Basic {
            username: username.to_string(),
            password: api_token.clone(),
        };

        let http = ServiceClient::new(
            "tracker",
            base_url,
            credentials,
            Duration::from_secs(section.timeout_secs),
            true,
        )?;

        Ok(Self { http })
    }

    pub async fn test_connection(&self) -> Result<(), ClientError> {
        self.http.expect_ok(SERVER_INFO_PATH).await
    }

    /// Fetches one ticket by key. `Ok(None)` when the tracker does not know it.
    pub async fn get_ticket(&self, key: &str) -> Result<Option<Ticket>, ClientError> {
        let url = self.http.endpoint_with_segment(ISSUE_PATH, key)?;
        match self.http.get_json_url::<RawIssue>(url, &[]).await {
            Ok(issue) => Ok(Some(issue.into())),
            Err(ClientError::Status(404)) => {
                tracing::debug!(key, "Ticket not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs a JQL search
    pub async fn search_tickets(
        &self,
        jql: &str,
        max_results: u32,
    ) -> Result<Vec<Ticket>, ClientError> {
        let query = [
            ("jql", jql.to_string()),
            ("maxResults", max_results.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];

        let response: SearchResponse = self.http.get_json(SEARCH_PATH, &query).await?;
        tracing::debug!(jql, count = response.issues.len(), "Ticket search completed");
        Ok(response.issues.into_iter().map(Ticket::from).collect())
    }

    pub async fn get_tickets_by_project(
        &self,
        project_key: &str,
        max_results: u32,
    ) -> Result<Vec<Ticket>, ClientError> {
        self.search_tickets(&format!("project = {}", project_key), max_results)
            .await
    }

    pub async fn get_tickets_by_assignee(
        &self,
        assignee: &str,
        max_results: u32,
    ) -> Result<Vec<Ticket>, ClientError> {
        self.search_tickets(&format!("assignee = {}", quote_jql(assignee)), max_results)
            .await
    }

    pub async fn get_tickets_by_status(
        &self,
        status: &str,
        max_results: u32,
    ) -> Result<Vec<Ticket>, ClientError> {
        self.search_tickets(&format!("status = {}", quote_jql(status)), max_results)
            .await
    }

    /// Tickets created or updated within the last `days` days
    pub async fn get_recent_tickets(
        &self,
        days: u32,
        max_results: u32,
    ) -> Result<Vec<Ticket>, ClientError> {
        let jql = format!("created >= -{days}d OR updated >= -{days}d");
        self.search_tickets(&jql, max_results).await
    }

    /// Names of every issue type the tracker defines
    pub async fn get_ticket_types(&self) -> Result<Vec<String>, ClientError> {
        let types: Vec<Named> = self.http.get_json(ISSUE_TYPE_PATH, &[]).await?;
        Ok(types.into_iter().map(|t| t.name).collect())
    }

    pub async fn get_projects(&self) -> Result<Vec<Project>, ClientError> {
        self.http.get_json(PROJECT_PATH, &[]).await
    }
}

// * JQL string literal: double quotes, with embedded quotes and backslashes escaped
fn quote_jql(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl ReadinessProbe for TrackerClient {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(self.test_connection())
    }
}

/// Groups tickets by type, status, priority, assignee and project
pub fn analyze_tickets(tickets: &[Ticket]) -> TicketAnalysis {
    let mut analysis = TicketAnalysis {
        total: tickets.len(),
        ..TicketAnalysis::default()
    };

    let mut labels = BTreeSet::new();
    let mut components = BTreeSet::new();

    for ticket in tickets {
        labels.extend(ticket.labels.iter().cloned());
        components.extend(ticket.components.iter().cloned());
        *analysis.by_type.entry(ticket.issue_type.clone()).or_default() += 1;
        *analysis.by_status.entry(ticket.status.clone()).or_default() += 1;
        if let Some(priority) = &ticket.priority {
            *analysis.by_priority.entry(priority.clone()).or_default() += 1;
        }
        let assignee = ticket.assignee.as_deref().unwrap_or(UNASSIGNED);
        *analysis.by_assignee.entry(assignee.to_string()).or_default() += 1;
        *analysis.by_project.entry(ticket.project_key.clone()).or_default() += 1;
    }

    analysis.unique_labels = labels.into_iter().collect();
    analysis.unique_components = components.into_iter().collect();
    analysis
}
