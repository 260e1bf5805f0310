use std::time::Duration;

use color_eyre::eyre::Context;
use itertools::Itertools;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value as Json, json};
use tracing::instrument;

use crate::{
    config::Config,
    errors::{Result, UserFacingError},
};

/// Default cap on issues returned by a search
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// A Jira issue, flattened to the fields the CLI works with
#[derive(Debug, Clone, PartialEq)]
pub struct JiraIssue {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_type: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub labels: Vec<String>,
    /// Browse URL of the issue on the Jira instance
    pub url: String,
}

impl JiraIssue {
    /// Renders the issue as a textual block suitable for a provider prompt
    pub fn to_context(&self) -> String {
        let mut lines = vec![
            format!("Jira issue {}: {}", self.key, self.summary),
            format!(
                "Status: {} | Type: {}{}",
                self.status,
                self.issue_type,
                self.priority.as_deref().map(|p| format!(" | Priority: {p}")).unwrap_or_default()
            ),
        ];
        if let Some(assignee) = &self.assignee {
            lines.push(format!("Assignee: {assignee}"));
        }
        if !self.labels.is_empty() {
            lines.push(format!("Labels: {}", self.labels.join(", ")));
        }
        if let Some(description) = &self.description {
            lines.push(String::new());
            lines.push(description.clone());
        }
        lines.join("\n")
    }
}

/// A Jira project summary
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JiraProject {
    pub key: String,
    pub name: String,
}

/// An available workflow transition for an issue
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
}

/// Client for the Jira REST API, authenticated with email and API token
#[derive(Debug)]
pub struct JiraClient {
    inner: Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    /// Creates a client from the configuration, failing early when the Jira
    /// connection is not fully configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some((base_url, email, api_token)) = config.jira.resolved() else {
            return Err(UserFacingError::Jira(String::from(
                "not configured, set jira.url, jira.email and jira.api_token (or the JIRA_URL, JIRA_EMAIL and \
                 JIRA_API_TOKEN environment variables)",
            ))
            .into());
        };

        let inner = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent("flow")
            .build()
            .wrap_err("Couldn't build Jira client")?;

        Ok(Self {
            inner,
            base_url,
            email,
            api_token,
        })
    }

    /// Fetches a single issue by key
    #[instrument(skip(self))]
    pub async fn get_issue(&self, key: &str) -> Result<JiraIssue> {
        let body = self
            .send(self.request(Method::GET, &format!("issue/{key}")), &format!("issue {key}"))
            .await?
            .json::<Json>()
            .await
            .map_err(|err| UserFacingError::Jira(format!("malformed response: {err}")))?;
        parse_issue(&body, &self.base_url)
    }

    /// Runs a JQL search and returns the matching issues
    #[instrument(skip(self))]
    pub async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssue>> {
        let body = self
            .send(
                self.request(Method::GET, "search")
                    .query(&[("jql", jql), ("maxResults", &max_results.to_string())]),
                "search",
            )
            .await?
            .json::<Json>()
            .await
            .map_err(|err| UserFacingError::Jira(format!("malformed response: {err}")))?;
        body.get("issues")
            .and_then(Json::as_array)
            .ok_or_else(|| UserFacingError::Jira(String::from("malformed response: missing 'issues' array")).into())
            .and_then(|issues| issues.iter().map(|i| parse_issue(i, &self.base_url)).collect())
    }

    /// Issues assigned to the authenticated user that are not done yet
    pub async fn my_issues(&self, max_results: u32) -> Result<Vec<JiraIssue>> {
        self.search(
            "assignee = currentUser() AND statusCategory != Done ORDER BY updated DESC",
            max_results,
        )
        .await
    }

    /// Issues of a project, optionally narrowed to a status
    pub async fn project_issues(
        &self,
        project: &str,
        status: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<JiraIssue>> {
        self.search(&build_jql(project, status), max_results).await
    }

    /// Creates an issue and fetches it back in full
    #[instrument(skip(self, description))]
    pub async fn create_issue(
        &self,
        project: &str,
        summary: &str,
        description: Option<&str>,
        issue_type: &str,
    ) -> Result<JiraIssue> {
        let request_body = json!({
            "fields": {
                "project": { "key": project },
                "summary": summary,
                "description": description.unwrap_or_default(),
                "issuetype": { "name": issue_type },
            }
        });
        let body = self
            .send(self.request(Method::POST, "issue").json(&request_body), "issue creation")
            .await?
            .json::<Json>()
            .await
            .map_err(|err| UserFacingError::Jira(format!("malformed response: {err}")))?;
        let key = body
            .get("key")
            .and_then(Json::as_str)
            .ok_or_else(|| UserFacingError::Jira(String::from("malformed response: created issue has no key")))?;
        self.get_issue(key).await
    }

    /// Adds a comment to an issue
    #[instrument(skip(self, body))]
    pub async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        self.send(
            self.request(Method::POST, &format!("issue/{key}/comment"))
                .json(&json!({ "body": body })),
            &format!("comment on {key}"),
        )
        .await?;
        Ok(())
    }

    /// The workflow transitions currently available for an issue
    pub async fn transitions(&self, key: &str) -> Result<Vec<JiraTransition>> {
        let body = self
            .send(
                self.request(Method::GET, &format!("issue/{key}/transitions")),
                &format!("transitions of {key}"),
            )
            .await?
            .json::<TransitionsResponse>()
            .await
            .map_err(|err| UserFacingError::Jira(format!("malformed response: {err}")))?;
        Ok(body.transitions)
    }

    /// Moves an issue to the transition matching the given name, case-insensitively.
    ///
    /// When no transition matches, the error lists the ones available.
    #[instrument(skip(self))]
    pub async fn transition_issue(&self, key: &str, target: &str) -> Result<String> {
        let transitions = self.transitions(key).await?;
        let Some(transition) = transitions.iter().find(|t| t.name.eq_ignore_ascii_case(target)) else {
            let available = transitions.iter().map(|t| format!("'{}'", t.name)).join(", ");
            return Err(UserFacingError::Jira(format!(
                "no transition named '{target}' for {key}, available: {available}"
            ))
            .into());
        };
        self.send(
            self.request(Method::POST, &format!("issue/{key}/transitions"))
                .json(&json!({ "transition": { "id": transition.id } })),
            &format!("transition of {key}"),
        )
        .await?;
        Ok(transition.name.clone())
    }

    /// Projects visible to the authenticated user
    pub async fn projects(&self) -> Result<Vec<JiraProject>> {
        let projects = self
            .send(self.request(Method::GET, "project"), "projects")
            .await?
            .json::<Vec<JiraProject>>()
            .await
            .map_err(|err| UserFacingError::Jira(format!("malformed response: {err}")))?;
        Ok(projects)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .request(method, format!("{}/rest/api/2/{path}", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends a request and maps network and status failures to user-facing
    /// Jira errors
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let res = req.send().await.map_err(|err| {
            if err.is_timeout() {
                UserFacingError::Jira(format!("request for {what} timed out"))
            } else if err.is_connect() {
                UserFacingError::Jira(format!("couldn't connect to {}", self.base_url))
            } else {
                UserFacingError::Jira(err.to_string())
            }
        })?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        tracing::debug!("Got response [{status}]:\n{body}");
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                UserFacingError::Jira(String::from("authentication failed, check jira.email and jira.api_token"))
            }
            StatusCode::NOT_FOUND => UserFacingError::Jira(format!("{what} not found")),
            _ => UserFacingError::Jira(format!("request for {what} failed with {status}")),
        }
        .into())
    }
}

/// Builds the JQL for a project listing, newest activity first
fn build_jql(project: &str, status: Option<&str>) -> String {
    let mut jql = format!("project = {project}");
    if let Some(status) = status {
        jql.push_str(&format!(" AND status = \"{status}\""));
    }
    jql.push_str(" ORDER BY updated DESC");
    jql
}

fn parse_issue(value: &Json, base_url: &str) -> Result<JiraIssue> {
    let raw: RawIssue = serde_json::from_value(value.clone())
        .map_err(|err| UserFacingError::Jira(format!("malformed issue in response: {err}")))?;
    let fields = raw.fields;
    Ok(JiraIssue {
        url: format!("{base_url}/browse/{}", raw.key),
        key: raw.key,
        summary: fields.summary,
        description: fields.description.filter(|d| !d.is_empty()),
        status: fields.status.map(|n| n.name).unwrap_or_else(|| String::from("Unknown")),
        issue_type: fields.issuetype.map(|n| n.name).unwrap_or_else(|| String::from("Unknown")),
        priority: fields.priority.map(|n| n.name),
        assignee: fields.assignee.map(|u| u.display_name),
        reporter: fields.reporter.map(|u| u.display_name),
        labels: fields.labels,
    })
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    #[serde(default)]
    fields: RawFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFields {
    summary: String,
    description: Option<String>,
    status: Option<Named>,
    issuetype: Option<Named>,
    priority: Option<Named>,
    assignee: Option<RawUser>,
    reporter: Option<RawUser>,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}
