//! Sprint, resolution and worklog reports.
//!
//! A [`ReportBuilder`] renders the configured JQL for a report, runs the
//! search or worklog fetch inside a login scope and projects the results
//! into flat rows collected in a [`ReportTable`].

mod records;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;

use futures::FutureExt;
use serde::Serialize;
use tracing::{info, instrument, warn};

pub use records::{ReportRow, SubtaskRecord, TaskFields, TaskRecord, WorklogRecord, SUBTASK_FIELDS};

use crate::api::{Issue, IssueSearch, JiraClient, SearchQuery};
use crate::config::{jql_list, Config, CustomFields, QueryTemplates, ReportSettings, REPORT_DATE_FORMAT};
use crate::error::Result;

/// The available reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Tasks of the configured sprints.
    SprintTasks,
    /// Subtasks of the configured sprints.
    SprintSubtasks,
    /// Tasks resolved within the date range.
    ResolutionTasks,
    /// Tempo worklogs of the configured users.
    Worklogs,
}

impl ReportKind {
    /// Name of the JQL template in `[queries]`, if the report searches.
    pub fn query_name(&self) -> Option<&'static str> {
        match self {
            Self::SprintTasks => Some("sprint_tasks"),
            Self::SprintSubtasks => Some("subtasks"),
            Self::ResolutionTasks => Some("resolution_tasks"),
            Self::Worklogs => None,
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::SprintTasks => "Sprint tasks",
            Self::SprintSubtasks => "Sprint subtasks",
            Self::ResolutionTasks => "Resolved tasks",
            Self::Worklogs => "Worklogs",
        }
    }

    /// File name stem for exports.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::SprintTasks => "sprint_tasks",
            Self::SprintSubtasks => "sprint_subtasks",
            Self::ResolutionTasks => "resolution_tasks",
            Self::Worklogs => "worklogs",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Totals over a report's rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub kind: &'static str,
    pub rows: usize,
    pub issues: usize,
    pub original_estimate_hours: f64,
    pub time_spent_hours: f64,
    pub story_points: f64,
    pub partial: bool,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} rows over {} issues", self.kind, self.rows, self.issues)?;
        writeln!(f, "  Original estimate: {:.2} h", self.original_estimate_hours)?;
        writeln!(f, "  Time spent:        {:.2} h", self.time_spent_hours)?;
        write!(f, "  Story points:      {:.1}", self.story_points)?;
        if self.partial {
            write!(f, "\n  (partial: the search stopped on an invalid page)")?;
        }
        Ok(())
    }
}

/// The rows of one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable<R> {
    /// Which report produced the rows.
    pub kind: ReportKind,
    /// One row per issue, subtask or worklog.
    pub rows: Vec<R>,
    /// Whether the search ended early on an invalid page.
    pub partial: bool,
}

impl<R: ReportRow + Serialize> ReportTable<R> {
    /// Compute the report totals.
    pub fn summary(&self) -> ReportSummary {
        let issues: BTreeSet<&str> = self.rows.iter().map(ReportRow::key).collect();

        ReportSummary {
            kind: self.kind.title(),
            rows: self.rows.len(),
            issues: issues.len(),
            original_estimate_hours: self.rows.iter().map(ReportRow::original_estimate).sum(),
            time_spent_hours: self.rows.iter().map(ReportRow::time_spent).sum(),
            story_points: self.rows.iter().filter_map(ReportRow::story_points).sum(),
            partial: self.partial,
        }
    }

    /// Write the rows as a JSON array of objects keyed by column name.
    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, &self.rows)
    }
}

/// Builds reports from the configured queries.
#[derive(Debug)]
pub struct ReportBuilder {
    client: JiraClient,
    queries: QueryTemplates,
    custom_fields: CustomFields,
    settings: ReportSettings,
}

impl ReportBuilder {
    /// Create a builder and its JIRA client from the configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = JiraClient::new(&config.connection)?;
        Ok(Self::with_client(client, config))
    }

    /// Create a builder around an existing client.
    pub fn with_client(client: JiraClient, config: &Config) -> Self {
        Self {
            client,
            queries: config.queries.clone(),
            custom_fields: config.custom_fields.clone(),
            settings: config.report.clone(),
        }
    }

    /// Values available to query templates.
    fn template_values(&self) -> BTreeMap<&'static str, String> {
        let mut values = BTreeMap::new();
        values.insert("projects", jql_list(&self.settings.projects));
        values.insert("sprints", jql_list(&self.settings.sprints));
        values.insert("issue_types", jql_list(&self.settings.issue_types));
        values.insert("status", jql_list(&self.settings.status));
        values.insert(
            "date_from",
            self.settings.date_from.format(REPORT_DATE_FORMAT).to_string(),
        );
        values.insert(
            "date_to",
            self.settings.date_to.format(REPORT_DATE_FORMAT).to_string(),
        );
        values
    }

    /// Render the JQL of a searching report.
    pub fn jql(&self, kind: ReportKind) -> Result<String> {
        let name = kind.query_name().ok_or_else(|| {
            crate::error::AppError::other(format!("{} report does not use JQL", kind))
        })?;
        Ok(self.queries.render(name, &self.template_values())?)
    }

    /// Tasks of the configured sprints.
    pub async fn sprint_tasks(&mut self) -> Result<ReportTable<TaskRecord>> {
        self.task_report(ReportKind::SprintTasks).await
    }

    /// Tasks resolved within the configured date range.
    pub async fn resolution_tasks(&mut self) -> Result<ReportTable<TaskRecord>> {
        self.task_report(ReportKind::ResolutionTasks).await
    }

    #[instrument(skip(self))]
    async fn task_report(&mut self, kind: ReportKind) -> Result<ReportTable<TaskRecord>> {
        let jql = self.jql(kind)?;
        let fields = TaskFields::from_custom_fields(&self.custom_fields)?;
        let query = SearchQuery::new(jql).fields(fields.requested());

        let (rows, partial) = self
            .client
            .with_session(move |jira| {
                async move {
                    let search = jira.search(query, |issue| TaskRecord::from_issue(&issue, &fields));
                    Ok(drain(search).await)
                }
                .boxed()
            })
            .await?;

        Ok(finish(kind, rows, partial))
    }

    /// Subtasks of the configured sprints.
    #[instrument(skip(self))]
    pub async fn sprint_subtasks(&mut self) -> Result<ReportTable<SubtaskRecord>> {
        let kind = ReportKind::SprintSubtasks;
        let query = SearchQuery::new(self.jql(kind)?).fields(SUBTASK_FIELDS);

        let (rows, partial) = self
            .client
            .with_session(move |jira| {
                async move {
                    let search = jira.search(query, |issue| SubtaskRecord::from_issue(&issue));
                    Ok(drain(search).await)
                }
                .boxed()
            })
            .await?;

        Ok(finish(kind, rows, partial))
    }

    /// Worklogs of every configured user, optionally narrowed to a project.
    #[instrument(skip(self))]
    pub async fn worklogs(
        &mut self,
        project_key: Option<String>,
    ) -> Result<ReportTable<WorklogRecord>> {
        let settings = self.settings.clone();

        let worklogs = self
            .client
            .with_session(move |jira| {
                async move {
                    let mut worklogs = Vec::new();
                    for username in &settings.usernames {
                        worklogs.extend(
                            jira.worklogs(
                                settings.date_from,
                                settings.date_to,
                                username,
                                project_key.as_deref(),
                            )
                            .await?,
                        );
                    }
                    Ok(worklogs)
                }
                .boxed()
            })
            .await?;

        let rows = worklogs.iter().map(WorklogRecord::from_worklog).collect();
        Ok(finish(ReportKind::Worklogs, rows, false))
    }
}

/// Pull every item out of a search, noting whether it stopped early.
async fn drain<T, F>(mut search: IssueSearch<'_, F>) -> (Vec<T>, bool)
where
    F: FnMut(Issue) -> T,
{
    let mut items = Vec::new();
    while let Some(item) = search.next().await {
        items.push(item);
    }
    (items, search.is_truncated())
}

fn finish<R>(kind: ReportKind, rows: Vec<R>, partial: bool) -> ReportTable<R> {
    if partial {
        warn!("{} report is partial: search stopped early", kind);
    }
    info!("{} report built with {} rows", kind, rows.len());
    ReportTable { kind, rows, partial }
}
