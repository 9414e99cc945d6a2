//! Flat report rows projected from issues and worklogs.
//!
//! Projections never fail: absent people and resolutions become `None`,
//! absent estimates become zero, and durations are converted from seconds
//! to hours.

use serde::Serialize;
use serde_json::Value;

use crate::api::{Issue, Worklog};
use crate::config::CustomFields;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Aggregates shared by every row type, used for report summaries.
pub trait ReportRow {
    /// Issue key of the row.
    fn key(&self) -> &str;

    /// Hours spent.
    fn time_spent(&self) -> f64;

    /// Hours originally estimated.
    fn original_estimate(&self) -> f64 {
        0.0
    }

    /// Story points, when the row carries them.
    fn story_points(&self) -> Option<f64> {
        None
    }
}

/// Field IDs requested for task reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    /// Story points custom field ID.
    pub story_points: String,
    /// T-shirt size custom field ID.
    pub t_shirt_size: String,
}

impl TaskFields {
    /// Resolve the custom field IDs.
    pub fn from_custom_fields(custom_fields: &CustomFields) -> crate::config::Result<Self> {
        Ok(Self {
            story_points: custom_fields.story_points()?.to_string(),
            t_shirt_size: custom_fields.t_shirt_size()?.to_string(),
        })
    }

    /// Fields to request from search.
    pub fn requested(&self) -> Vec<String> {
        vec![
            "key".to_string(),
            "assignee".to_string(),
            "summary".to_string(),
            self.story_points.clone(),
            self.t_shirt_size.clone(),
            "aggregatetimeoriginalestimate".to_string(),
            "aggregatetimespent".to_string(),
            "issuetype".to_string(),
            "project".to_string(),
        ]
    }
}

/// Fields to request for subtask reports.
pub const SUBTASK_FIELDS: [&str; 9] = [
    "key",
    "parent",
    "assignee",
    "summary",
    "aggregatetimeoriginalestimate",
    "aggregatetimespent",
    "issuetype",
    "resolution",
    "status",
];

/// One task of a sprint or resolution report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Assignee")]
    pub assignee: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Type")]
    pub issue_type: String,
    #[serde(rename = "T-Shirt")]
    pub t_shirt: Option<String>,
    #[serde(rename = "Story Points")]
    pub story_points: Option<f64>,
    #[serde(rename = "Original Estimate")]
    pub original_estimate: f64,
    #[serde(rename = "Time Spent")]
    pub time_spent: f64,
    #[serde(rename = "Project")]
    pub project: String,
}

impl TaskRecord {
    /// Project an issue.
    pub fn from_issue(issue: &Issue, fields: &TaskFields) -> Self {
        Self {
            key: issue.key.clone(),
            assignee: issue
                .nested_str("assignee", "displayName")
                .map(str::to_string),
            summary: issue.field_str("summary").unwrap_or_default().to_string(),
            issue_type: issue
                .nested_str("issuetype", "name")
                .unwrap_or_default()
                .to_string(),
            t_shirt: issue
                .nested_str(&fields.t_shirt_size, "value")
                .map(str::to_string),
            story_points: issue.field_f64(&fields.story_points),
            original_estimate: hours(issue.field_f64("aggregatetimeoriginalestimate")),
            time_spent: hours(issue.field_f64("aggregatetimespent")),
            project: issue
                .nested_str("project", "name")
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl ReportRow for TaskRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn time_spent(&self) -> f64 {
        self.time_spent
    }

    fn original_estimate(&self) -> f64 {
        self.original_estimate
    }

    fn story_points(&self) -> Option<f64> {
        self.story_points
    }
}

/// One subtask of a sprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskRecord {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Parent")]
    pub parent: String,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Type")]
    pub issue_type: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Resolution")]
    pub resolution: Option<String>,
    #[serde(rename = "Original Estimate")]
    pub original_estimate: f64,
    #[serde(rename = "Time Spent")]
    pub time_spent: f64,
    #[serde(rename = "Assignee")]
    pub assignee: Option<String>,
}

impl SubtaskRecord {
    /// Project an issue.
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            key: issue.key.clone(),
            parent: issue.nested_str("parent", "key").unwrap_or_default().to_string(),
            summary: issue.field_str("summary").unwrap_or_default().to_string(),
            issue_type: issue
                .nested_str("issuetype", "name")
                .unwrap_or_default()
                .to_string(),
            status: issue.nested_str("status", "name").unwrap_or_default().to_string(),
            resolution: issue.nested_str("resolution", "name").map(str::to_string),
            original_estimate: hours(issue.field_f64("aggregatetimeoriginalestimate")),
            time_spent: hours(issue.field_f64("aggregatetimespent")),
            assignee: issue
                .nested_str("assignee", "displayName")
                .map(str::to_string),
        }
    }
}

impl ReportRow for SubtaskRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn time_spent(&self) -> f64 {
        self.time_spent
    }

    fn original_estimate(&self) -> f64 {
        self.original_estimate
    }
}

/// One Tempo worklog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorklogRecord {
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Issue")]
    pub issue: String,
    #[serde(rename = "Type")]
    pub issue_type: String,
    #[serde(rename = "Time Spent")]
    pub time_spent: f64,
    #[serde(rename = "Comment")]
    pub comment: Option<String>,
}

impl WorklogRecord {
    /// Project a worklog.
    pub fn from_worklog(worklog: &Worklog) -> Self {
        let text = |pointer: &str| {
            worklog
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            author: text("/author/displayName"),
            key: text("/issue/key"),
            issue: text("/issue/summary"),
            issue_type: text("/issue/issueType/name"),
            time_spent: hours(worklog.get("timeSpentSeconds").and_then(Value::as_f64)),
            comment: worklog
                .get("comment")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

impl ReportRow for WorklogRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn time_spent(&self) -> f64 {
        self.time_spent
    }
}

fn hours(seconds: Option<f64>) -> f64 {
    seconds.map_or(0.0, |s| s / SECONDS_PER_HOUR)
}
