//! JIRA API client and types.
//!
//! This module provides the session-based client for the JIRA REST API v2
//! and the Tempo timesheets API.

mod auth;
mod client;
pub mod error;
mod search;
pub mod types;
mod worklogs;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{delete_password, get_password, store_password, Credentials, MAX_LOGIN_TRIES};
pub use client::{normalize_base_url, ApiRequest, JiraClient, API_ROOT};
pub use error::ApiError;
pub use search::{IssueSearch, SearchQuery, DEFAULT_PAGE_SIZE};
pub use types::{HttpMethod, Issue, Resource, SearchPage, SessionToken, Worklog};
