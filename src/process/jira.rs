use prettytable::{Table, format, row};
use tracing::instrument;

use super::{AppContext, Process, ProcessOutput, spinner};
use crate::{
    ai::ProviderClient,
    cli::{
        JiraCommentProcess, JiraCreateProcess, JiraListProcess, JiraMineProcess, JiraProjectsProcess,
        JiraTransitionProcess, JiraViewProcess, JiraWorkProcess,
    },
    errors::{Result, UserFacingError},
    jira::{JiraClient, JiraIssue},
};

const PLAN_SYSTEM_PROMPT: &str = "You are an experienced software engineer planning the implementation of a ticket. \
                                  Based on the issue details provided as context, draft a concise implementation \
                                  plan: the steps to take, the parts of the codebase likely involved, edge cases to \
                                  watch for, and how to verify the result. Use markdown formatting.";

impl Process for JiraViewProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner(format!("Fetching {}...", self.key));
        let issue = jira.get_issue(&self.key).await;
        bar.finish_and_clear();
        Ok(ProcessOutput::success().stdout(issue_details(&issue?)))
    }
}

impl Process for JiraMineProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner("Fetching your issues...");
        let issues = jira.my_issues(self.limit).await;
        bar.finish_and_clear();
        let issues = issues?;
        if issues.is_empty() {
            return Ok(ProcessOutput::success().stdout("No open issues assigned to you"));
        }
        Ok(ProcessOutput::success().stdout(issue_table(&issues).to_string()))
    }
}

impl Process for JiraListProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let project = resolve_project(self.project, ctx)?;
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner(format!("Fetching issues of {project}..."));
        let issues = jira.project_issues(&project, self.status.as_deref(), self.limit).await;
        bar.finish_and_clear();
        let issues = issues?;
        if issues.is_empty() {
            return Ok(ProcessOutput::success().stdout(format!("No matching issues in {project}")));
        }
        Ok(ProcessOutput::success().stdout(issue_table(&issues).to_string()))
    }
}

impl Process for JiraCreateProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let project = resolve_project(self.project, ctx)?;
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner(format!("Creating issue in {project}..."));
        let issue = jira
            .create_issue(&project, &self.summary, self.description.as_deref(), &self.issue_type)
            .await;
        bar.finish_and_clear();
        let issue = issue?;
        Ok(ProcessOutput::success().stdout(format!("Created {}: {}", issue.key, issue.url)))
    }
}

impl Process for JiraCommentProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        jira.add_comment(&self.key, &self.body).await?;
        Ok(ProcessOutput::success().stdout(format!("Comment added to {}", self.key)))
    }
}

impl Process for JiraTransitionProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        let name = jira.transition_issue(&self.key, &self.status).await?;
        Ok(ProcessOutput::success().stdout(format!("Moved {} to {name}", self.key)))
    }
}

impl Process for JiraProjectsProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner("Fetching projects...");
        let projects = jira.projects().await;
        bar.finish_and_clear();
        let projects = projects?;
        if projects.is_empty() {
            return Ok(ProcessOutput::success().stdout("No visible projects"));
        }
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        table.set_titles(row!["Key", "Name"]);
        for project in projects {
            table.add_row(row![project.key, project.name]);
        }
        Ok(ProcessOutput::success().stdout(table.to_string()))
    }
}

impl Process for JiraWorkProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let jira = JiraClient::from_config(&ctx.config)?;
        let bar = spinner(format!("Fetching {}...", self.key));
        let issue = jira.get_issue(&self.key).await;
        bar.finish_and_clear();
        let issue = issue?;

        let mut sections = vec![issue_details(&issue)];
        let mut notes = Vec::new();

        if self.start {
            let name = jira.transition_issue(&self.key, "In Progress").await?;
            notes.push(format!("Moved {} to {name}", self.key));
        }

        if self.plan {
            let client = ProviderClient::from_config(&ctx.config)?;
            let prompt = format!("Draft an implementation plan for {}", issue.key);
            let bar = spinner("Drafting an implementation plan...");
            let res = client.generate(Some(PLAN_SYSTEM_PROMPT), &prompt, Some(&issue.to_context())).await;
            bar.finish_and_clear();
            sections.push(String::from("Implementation plan:"));
            sections.push(res?.text);
        }

        let mut output = ProcessOutput::success().stdout(sections.join("\n\n"));
        if !notes.is_empty() {
            output = output.stderr(notes.join("\n"));
        }
        Ok(output)
    }
}

/// The explicitly given project, or the configured default
fn resolve_project(given: Option<String>, ctx: &AppContext) -> Result<String> {
    given.or_else(|| ctx.config.jira.project()).ok_or_else(|| {
        UserFacingError::Jira(String::from("no project given and jira.default_project is not set")).into()
    })
}

fn issue_table(issues: &[JiraIssue]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(row!["Key", "Type", "Status", "Summary"]);
    for issue in issues {
        table.add_row(row![issue.key, issue.issue_type, issue.status, issue.summary]);
    }
    table
}

fn issue_details(issue: &JiraIssue) -> String {
    let mut lines = vec![
        format!("{}: {}", issue.key, issue.summary),
        format!("Status:   {}", issue.status),
        format!("Type:     {}", issue.issue_type),
    ];
    if let Some(priority) = &issue.priority {
        lines.push(format!("Priority: {priority}"));
    }
    if let Some(assignee) = &issue.assignee {
        lines.push(format!("Assignee: {assignee}"));
    }
    if let Some(reporter) = &issue.reporter {
        lines.push(format!("Reporter: {reporter}"));
    }
    if !issue.labels.is_empty() {
        lines.push(format!("Labels:   {}", issue.labels.join(", ")));
    }
    lines.push(format!("URL:      {}", issue.url));
    if let Some(description) = &issue.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_issue() -> JiraIssue {
        JiraIssue {
            key: String::from("PROJ-7"),
            summary: String::from("Do the thing"),
            description: Some(String::from("More detail")),
            status: String::from("To Do"),
            issue_type: String::from("Task"),
            priority: None,
            assignee: Some(String::from("Sam Doe")),
            reporter: None,
            labels: Vec::new(),
            url: String::from("https://acme.atlassian.net/browse/PROJ-7"),
        }
    }

    #[test]
    fn test_issue_details() {
        let details = issue_details(&sample_issue());
        assert!(details.starts_with("PROJ-7: Do the thing"));
        assert!(details.contains("Status:   To Do"));
        assert!(details.contains("Assignee: Sam Doe"));
        assert!(!details.contains("Priority:"));
        assert!(details.ends_with("More detail"));
    }

    #[test]
    fn test_issue_table_columns() {
        let rendered = issue_table(std::slice::from_ref(&sample_issue())).to_string();
        assert!(rendered.contains("PROJ-7"));
        assert!(rendered.contains("Do the thing"));
    }

    #[test]
    fn test_resolve_project_prefers_explicit() {
        let ctx = AppContext {
            config: crate::config::Config::default(),
            store: crate::config::ConfigStore::new(Some(std::path::PathBuf::from("/tmp/flow-test.toml"))).unwrap(),
        };
        assert_eq!(resolve_project(Some(String::from("ABC")), &ctx).unwrap(), "ABC");
        assert!(resolve_project(None, &ctx).is_err());
    }
}
