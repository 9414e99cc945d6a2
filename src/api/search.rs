//! Paginated JQL search.
//!
//! [`IssueSearch`] pulls issues page by page from `POST /rest/api/2/search`.
//! A page is only requested once the issues of the previous one have been
//! consumed. After each page the offset moves by `maxResults + 1`, so when a
//! result set spans several pages the issue sitting right at each page
//! boundary is never requested.
//!
//! A page that cannot be fetched or decoded ends the search: the failure is
//! logged, [`IssueSearch::is_truncated`] turns true, and the issues yielded
//! so far stay valid.

use std::collections::VecDeque;

use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use super::client::{ApiRequest, JiraClient};
use super::error::{ApiError, Result};
use super::types::{HttpMethod, Issue, Resource, SearchPage};

/// Default number of issues requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// A JQL search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The JQL query string.
    pub jql: String,
    /// Fields to return; `None` lets JIRA pick its defaults.
    pub fields: Option<Vec<String>>,
    /// Entities to expand (e.g. `changelog`).
    pub expand: Option<String>,
    /// Page size of the first request.
    pub page_size: u64,
}

impl SearchQuery {
    /// Create a query with the default page size.
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            fields: None,
            expand: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Restrict the returned fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Expand entities.
    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Set the page size of the first request.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// The search request body for one page.
    fn body(&self, start_at: u64, max_results: u64) -> Value {
        let mut body = json!({
            "jql": self.jql,
            "startAt": start_at,
            "maxResults": max_results,
        });
        if let Some(fields) = &self.fields {
            body["fields"] = json!(fields);
        }
        if let Some(expand) = &self.expand {
            body["expand"] = json!(expand);
        }
        body
    }
}

/// Pagination state carried between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageCursor {
    start_at: u64,
    max_results: u64,
    total: u64,
}

impl PageCursor {
    /// Offset of the following page, `None` once it no longer fits in a `u64`.
    fn next_start(&self) -> Option<u64> {
        self.start_at
            .checked_add(self.max_results)
            .and_then(|n| n.checked_add(1))
    }
}

/// A lazy, finite search over all pages of a JQL query.
///
/// Every issue is passed through `transform` before it is yielded. Created
/// by [`JiraClient::search`]; run it inside [`JiraClient::with_session`].
pub struct IssueSearch<'c, F> {
    client: &'c JiraClient,
    query: SearchQuery,
    transform: F,
    buffer: VecDeque<Issue>,
    cursor: Option<PageCursor>,
    pages_fetched: u32,
    finished: bool,
    truncated: bool,
}

impl<'c, T, F> IssueSearch<'c, F>
where
    F: FnMut(Issue) -> T,
{
    /// Yield the next transformed issue, fetching a page when needed.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if let Some(issue) = self.buffer.pop_front() {
                return Some((self.transform)(issue));
            }
            if self.finished {
                return None;
            }
            self.fetch_next_page().await;
        }
    }

    /// Drain the search into a vector.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        items
    }

    /// Turn the search into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = T> + 'c
    where
        T: 'c,
        F: 'c,
    {
        stream::unfold(self, |mut search| async move {
            search.next().await.map(|item| (item, search))
        })
    }

    /// Check whether the search stopped on a malformed or failed page.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Check whether every page has been fetched and consumed.
    pub fn is_finished(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }

    /// Number of search requests made so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Total reported by the first page, once known.
    pub fn total(&self) -> Option<u64> {
        self.cursor.map(|c| c.total)
    }

    async fn fetch_next_page(&mut self) {
        let (start_at, max_results) = match self.cursor {
            None => (0, self.query.page_size),
            Some(cursor) => match cursor.next_start() {
                Some(start_at) => (start_at, cursor.max_results),
                None => {
                    debug!(
                        "Search offset overflows after startAt={} maxResults={}",
                        cursor.start_at, cursor.max_results
                    );
                    self.finished = true;
                    return;
                }
            },
        };

        self.pages_fetched += 1;
        match self
            .client
            .search_page(&self.query, start_at, max_results)
            .await
        {
            Ok(page) => {
                let cursor = match self.cursor {
                    None => PageCursor {
                        start_at: page.start_at,
                        max_results: page.max_results,
                        total: page.total,
                    },
                    Some(previous) => PageCursor {
                        start_at,
                        ..previous
                    },
                };

                if cursor.start_at < cursor.total {
                    self.buffer.extend(page.issues);
                } else {
                    debug!(
                        "Search exhausted at startAt={} (total {})",
                        cursor.start_at, cursor.total
                    );
                    self.finished = true;
                }
                self.cursor = Some(cursor);
            }
            Err(e) => {
                error!("Invalid search response at startAt={}: {}", start_at, e);
                self.finished = true;
                self.truncated = true;
            }
        }
    }
}

impl JiraClient {
    /// Search issues with JQL, lazily iterating over every page.
    ///
    /// No request is made until the first item is pulled.
    pub fn search<T, F>(&self, query: SearchQuery, transform: F) -> IssueSearch<'_, F>
    where
        F: FnMut(Issue) -> T,
    {
        IssueSearch {
            client: self,
            query,
            transform,
            buffer: VecDeque::new(),
            cursor: None,
            pages_fetched: 0,
            finished: false,
            truncated: false,
        }
    }

    /// Fetch a single search page.
    ///
    /// # Errors
    ///
    /// Transport failures, an empty body, or a page missing any of
    /// `total`, `startAt`, `maxResults` and `issues`.
    #[instrument(skip(self, query), fields(jql = %query.jql))]
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        start_at: u64,
        max_results: u64,
    ) -> Result<SearchPage> {
        debug!("Searching issues: startAt={}, maxResults={}", start_at, max_results);

        let response = self
            .request(
                ApiRequest::to(Resource::Search, HttpMethod::Post)
                    .json(query.body(start_at, max_results)),
            )
            .await?
            .ok_or_else(|| ApiError::InvalidResponse("empty search response".to_string()))?;

        let page: SearchPage = serde_json::from_value(response).map_err(|e| {
            ApiError::InvalidResponse(format!("malformed search page: {}", e))
        })?;

        debug!("Found {} issues (total: {})", page.issues.len(), page.total);
        Ok(page)
    }
}
