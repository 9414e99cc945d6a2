//! Tempo timesheet worklogs.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, instrument};

use super::client::{ApiRequest, JiraClient};
use super::error::{ApiError, Result};
use super::types::{HttpMethod, Resource, Worklog};

/// Date format expected by the Tempo API.
const TEMPO_DATE_FORMAT: &str = "%Y-%m-%d";

impl JiraClient {
    /// Fetch the worklogs of a user within a date range.
    ///
    /// Calls `GET /rest/tempo-timesheets/3/worklogs` once; the endpoint is not
    /// paginated. Records are returned exactly as the server sent them.
    ///
    /// # Arguments
    ///
    /// * `date_from` - First day of the range (inclusive)
    /// * `date_to` - Last day of the range (inclusive)
    /// * `username` - Author of the worklogs
    /// * `project_key` - Optional project to narrow the query to
    #[instrument(skip(self))]
    pub async fn worklogs(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        username: &str,
        project_key: Option<&str>,
    ) -> Result<Vec<Worklog>> {
        let mut request = ApiRequest::to(Resource::Worklogs, HttpMethod::Get)
            .param("dateFrom", date_from.format(TEMPO_DATE_FORMAT).to_string())
            .param("dateTo", date_to.format(TEMPO_DATE_FORMAT).to_string())
            .param("username", username);

        if let Some(project_key) = project_key {
            request = request.param("projectKey", project_key);
        }

        let worklogs = match self.request(request).await? {
            None => Vec::new(),
            Some(Value::Array(worklogs)) => worklogs,
            Some(other) => {
                return Err(ApiError::InvalidResponse(format!(
                    "expected a list of worklogs, got {}",
                    json_kind(&other)
                )))
            }
        };

        debug!("Fetched {} worklogs", worklogs.len());
        Ok(worklogs)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
