//! Report settings configuration.

use chrono::NaiveDate;
use serde::Deserialize;

use super::{ConfigError, Result};

/// Date format used in the `[report]` section and rendered into JQL.
pub const REPORT_DATE_FORMAT: &str = "%Y/%m/%d";

/// The `[report]` section as written in the file.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RawReport {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub usernames: Option<Vec<String>>,
    #[serde(default)]
    pub sprints: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub issue_types: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
}

/// Parameters shared by every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// First day of the reporting range.
    pub date_from: NaiveDate,
    /// Last day of the reporting range.
    pub date_to: NaiveDate,
    /// Users whose worklogs are reported.
    pub usernames: Vec<String>,
    /// Sprints for the sprint reports.
    pub sprints: Vec<String>,
    /// Projects to report on.
    pub projects: Vec<String>,
    /// Issue types for the resolution report.
    pub issue_types: Vec<String>,
    /// Statuses for the resolution report.
    pub status: Vec<String>,
}

impl ReportSettings {
    pub(super) fn from_raw(raw: RawReport) -> Result<Self> {
        let date_from = parse_date(
            "report.date_from",
            raw.date_from
                .as_deref()
                .ok_or_else(|| ConfigError::MissingKey("report.date_from".to_string()))?,
        )?;
        let date_to = parse_date(
            "report.date_to",
            raw.date_to
                .as_deref()
                .ok_or_else(|| ConfigError::MissingKey("report.date_to".to_string()))?,
        )?;
        let usernames = raw
            .usernames
            .ok_or_else(|| ConfigError::MissingKey("report.usernames".to_string()))?;

        let settings = Self {
            date_from,
            date_to,
            usernames: clean(usernames),
            sprints: clean(raw.sprints),
            projects: clean(raw.projects),
            issue_types: clean(raw.issue_types),
            status: clean(raw.status),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` when the date range is
    /// reversed or no username is given.
    pub fn validate(&self) -> Result<()> {
        if self.date_from > self.date_to {
            return Err(ConfigError::ValidationError(format!(
                "report date_from {} is after date_to {}",
                self.date_from.format(REPORT_DATE_FORMAT),
                self.date_to.format(REPORT_DATE_FORMAT)
            )));
        }

        if self.usernames.is_empty() {
            return Err(ConfigError::ValidationError(
                "report usernames cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Trim entries and drop empty ones.
fn clean(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), REPORT_DATE_FORMAT).map_err(|e| {
        ConfigError::ValidationError(format!(
            "{} '{}' is not a YYYY/MM/DD date: {}",
            key, value, e
        ))
    })
}
