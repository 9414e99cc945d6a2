//! jira-reports - sprint, resolution and worklog reports from JIRA.
//!
//! The [`api`] module wraps the JIRA REST API: a session client, login with
//! retries, a login scope that always logs out, lazy paginated JQL search and
//! Tempo worklogs. [`reports`] turns search results into flat rows driven by
//! the TOML [`config`], and [`mail`] hands finished reports to a mail
//! transport.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod reports;
