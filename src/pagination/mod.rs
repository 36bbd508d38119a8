//! Pagination over list endpoints.
//!
//! [`GitHubIterator`] walks a collection by following the `rel="next"` links
//! of the `Link` header, one page at a time, and yields typed items lazily
//! until the collection or the requested item budget runs out.
//! [`SearchIterator`] does the same over search endpoints, whose pages wrap
//! the items in an object carrying `total_count`.

use crate::client::GitHubCore;
use crate::errors::{GitHubError, GitHubResult};
use crate::http::HttpResponse;
use crate::observability::TracingHooks;
use crate::session::RequestOptions;
use crate::types::Model;
use futures::stream::{self, Stream};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: i64 = 100;

/// Budget meaning "every item in the collection".
pub const UNBOUNDED: i64 = -1;

/// Pagination links parsed from Link header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationLinks {
    /// URL for the next page.
    pub next: Option<String>,
    /// URL for the previous page.
    pub prev: Option<String>,
    /// URL for the first page.
    pub first: Option<String>,
    /// URL for the last page.
    pub last: Option<String>,
}

impl PaginationLinks {
    /// Parses pagination links from the Link header (RFC 8288).
    ///
    /// Targets are read between `<` and `>` first, so commas inside a URL do
    /// not split a link.
    pub fn from_header(header_value: &str) -> Self {
        let mut links = Self::default();
        let mut rest = header_value;

        while let Some(start) = rest.find('<') {
            let Some(len) = rest[start + 1..].find('>') else {
                break;
            };
            let url = &rest[start + 1..start + 1 + len];
            let tail = &rest[start + 2 + len..];
            let params_end = tail.find('<').unwrap_or(tail.len());
            let params = &tail[..params_end];
            rest = &tail[params_end..];

            let rel = params
                .split(';')
                .map(|segment| segment.trim().trim_end_matches(',').trim())
                .find_map(|segment| segment.strip_prefix("rel="))
                .map(|value| value.trim_matches('"'));

            if let Some(rel) = rel {
                // rel may hold several space separated relation types
                for rel in rel.split_whitespace() {
                    match rel {
                        "next" => links.next = Some(url.to_string()),
                        "prev" => links.prev = Some(url.to_string()),
                        "first" => links.first = Some(url.to_string()),
                        "last" => links.last = Some(url.to_string()),
                        _ => {}
                    }
                }
            }
        }

        links
    }

    /// Parses pagination links from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(Self::from_header)
            .unwrap_or_default()
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Gets the total page count from the last link.
    pub fn total_pages(&self) -> Option<u32> {
        self.last.as_deref().and_then(extract_page_number)
    }
}

/// Extracts page number from a URL.
pub fn extract_page_number(url: &str) -> Option<u32> {
    url::Url::parse(url).ok().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

/// Where a traversal stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Nothing requested yet, or reset by [`GitHubIterator::refresh`].
    NotStarted,
    /// The next pull requests a page.
    Fetching,
    /// Items of the current page are being handed out.
    Yielding,
    /// Terminal until refreshed.
    Exhausted,
}

/// Metadata of the most recent search page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPageMetadata {
    /// Total matches reported by the server, kept when a later page omits it.
    pub total_count: Option<u64>,
    /// Whether the search timed out server side, kept like `total_count`.
    pub incomplete_results: Option<bool>,
    /// Raw items of the most recent page only.
    pub items: Vec<Value>,
}

enum RawItem {
    Value(Value),
    Entry(String, Value),
}

/// Lazy traversal of a paginated collection.
///
/// Pull items with [`try_next`](Self::try_next) or turn the iterator into a
/// [`Stream`] with [`into_stream`](Self::into_stream). At most one page is
/// buffered and a page is requested only when an item is pulled and the
/// budget allows one more.
///
/// The budget (`count`) is the number of items wanted; [`UNBOUNDED`] walks
/// the whole collection and `0` never sends a request. Query parameters are
/// sent with the first request only; later requests follow the server's
/// `next` links verbatim. Extra headers go with every request.
///
/// The `ETag` is captured from the first page of a traversal only, so a
/// conditional [`refresh`](Self::refresh) asks whether the collection changed
/// since it was last walked from the start.
pub struct GitHubIterator<T> {
    core: GitHubCore,
    url: String,
    original_count: i64,
    remaining: i64,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    list_key: Option<String>,
    etag: Option<String>,
    if_none_match: Option<String>,
    pending_params: Vec<(String, String)>,
    next_url: Option<String>,
    first_request: bool,
    page: VecDeque<RawItem>,
    last_status: Option<u16>,
    last_response: Option<HttpResponse>,
    state: IteratorState,
    search: Option<SearchPageMetadata>,
    _item: PhantomData<fn() -> T>,
}

impl<T: Model> GitHubIterator<T> {
    /// Creates an iterator yielding up to `count` items starting at `url`.
    pub fn new(count: i64, url: impl Into<String>, core: GitHubCore) -> Self {
        Self {
            core,
            url: url.into(),
            original_count: count,
            remaining: count,
            params: Vec::new(),
            headers: Vec::new(),
            list_key: None,
            etag: None,
            if_none_match: None,
            pending_params: Vec::new(),
            next_url: None,
            first_request: true,
            page: VecDeque::new(),
            last_status: None,
            last_response: None,
            state: IteratorState::NotStarted,
            search: None,
            _item: PhantomData,
        }
    }

    /// Adds a query parameter for the first request.
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Adds query parameters for the first request.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Sends `If-None-Match: etag` with the first request.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Reads items from `body[list_key]` when the page is an object.
    pub fn with_list_key(mut self, list_key: impl Into<String>) -> Self {
        self.list_key = Some(list_key.into());
        self
    }

    pub(crate) fn for_search(mut self) -> Self {
        self.search = Some(SearchPageMetadata::default());
        self
    }

    /// Gets the next item, fetching a page when needed.
    ///
    /// Returns `Ok(None)` once the collection or the budget is exhausted. An
    /// error also ends the traversal; call [`refresh`](Self::refresh) to walk
    /// again.
    pub async fn try_next(&mut self) -> GitHubResult<Option<T>> {
        loop {
            match self.state {
                IteratorState::Exhausted => return Ok(None),
                IteratorState::NotStarted => self.begin(),
                IteratorState::Fetching => {
                    if let Err(error) = self.fetch_page().await {
                        self.finish();
                        return Err(error);
                    }
                }
                IteratorState::Yielding => {
                    if !self.has_budget() {
                        self.finish();
                        continue;
                    }
                    let Some(raw) = self.page.pop_front() else {
                        self.state = if self.next_url.is_some() {
                            IteratorState::Fetching
                        } else {
                            IteratorState::Exhausted
                        };
                        continue;
                    };
                    let item = match raw {
                        RawItem::Value(value) => T::from_json(value, &self.core),
                        RawItem::Entry(key, value) => T::from_entry(key, value, &self.core),
                    };
                    match item {
                        Ok(item) => {
                            if self.remaining > 0 {
                                self.remaining -= 1;
                            }
                            return Ok(Some(item));
                        }
                        Err(error) => {
                            self.finish();
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    /// Resets the traversal to the original URL, parameters and budget.
    ///
    /// With `conditional`, the first request of the new traversal carries
    /// `If-None-Match` with the captured `ETag`, and a `304` ends it without
    /// yielding anything. The captured `ETag` is cleared either way and is
    /// recaptured from the new first page.
    pub fn refresh(&mut self, conditional: bool) -> &mut Self {
        let etag = self.etag.take();
        self.if_none_match = if conditional { etag } else { None };
        self.remaining = self.original_count;
        self.next_url = None;
        self.page.clear();
        if let Some(meta) = self.search.as_mut() {
            meta.items.clear();
        }
        self.state = IteratorState::NotStarted;
        self
    }

    /// Drains the iterator into a vector.
    pub async fn collect_all(mut self) -> GitHubResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Converts the iterator into a stream of items.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = GitHubResult<T>> {
        stream::unfold(self, |mut iter| async move {
            match iter.try_next().await {
                Ok(Some(item)) => Some((Ok(item), iter)),
                Ok(None) => None,
                Err(error) => Some((Err(error), iter)),
            }
        })
    }

    // Accessors

    /// Gets the `ETag` of the first page of the current traversal.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Gets the status code of the most recent page.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Gets the most recent page response.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last_response.as_ref()
    }

    /// Items still allowed by the budget; `-1` when unbounded.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// The budget the iterator was created with.
    pub fn original_count(&self) -> i64 {
        self.original_count
    }

    /// The URL traversal starts from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The list key, if any.
    pub fn list_key(&self) -> Option<&str> {
        self.list_key.as_deref()
    }

    /// Current traversal state.
    pub fn state(&self) -> IteratorState {
        self.state
    }

    fn has_budget(&self) -> bool {
        self.remaining == UNBOUNDED || self.remaining > 0
    }

    fn finish(&mut self) {
        self.page.clear();
        self.next_url = None;
        self.state = IteratorState::Exhausted;
    }

    fn begin(&mut self) {
        if !self.has_budget() {
            self.state = IteratorState::Exhausted;
            return;
        }

        let mut params = self.params.clone();
        let count = self.original_count;
        if count > 0 && count <= MAX_PER_PAGE {
            params.retain(|(k, _)| k != "per_page");
            params.push(("per_page".to_string(), count.to_string()));
        } else if count == UNBOUNDED && !params.iter().any(|(k, _)| k == "per_page") {
            params.push(("per_page".to_string(), MAX_PER_PAGE.to_string()));
        }

        self.pending_params = params;
        self.next_url = Some(self.url.clone());
        self.first_request = true;
        self.state = IteratorState::Fetching;
    }

    async fn fetch_page(&mut self) -> GitHubResult<()> {
        let Some(url) = self.next_url.take() else {
            self.state = IteratorState::Exhausted;
            return Ok(());
        };

        let first = std::mem::replace(&mut self.first_request, false);
        let mut options = RequestOptions::new();
        options.headers = self.headers.clone();
        if first {
            options.params = std::mem::take(&mut self.pending_params);
            if let Some(etag) = self.if_none_match.take() {
                options = options.header("If-None-Match", etag);
            }
        }

        let response = self.core.get(&url, options).await?;
        let status = response.status();
        self.last_status = Some(status);
        self.last_response = Some(response.clone());
        if first {
            self.etag = response.etag().map(str::to_string);
        }

        let Some(body) = self.core.decode_json(&response, 200)? else {
            if status == 304 {
                TracingHooks::on_not_modified(&url);
            }
            self.state = IteratorState::Exhausted;
            return Ok(());
        };

        self.page = self.extract_items(body)?;
        self.next_url = response.links().next;
        TracingHooks::on_page_fetched(&url, status, self.page.len(), self.next_url.is_some());
        self.state = IteratorState::Yielding;
        Ok(())
    }

    fn extract_items(&mut self, body: Value) -> GitHubResult<VecDeque<RawItem>> {
        if let Some(meta) = self.search.as_mut() {
            let Value::Object(mut page) = body else {
                return Err(GitHubError::unprocessable_body("Search results must be a JSON object")
                    .with_body(body));
            };
            if let Some(total) = page.get("total_count").and_then(Value::as_u64) {
                meta.total_count = Some(total);
            }
            if let Some(incomplete) = page.get("incomplete_results").and_then(Value::as_bool) {
                meta.incomplete_results = Some(incomplete);
            }
            let items = match page.remove("items") {
                Some(Value::Array(items)) => items,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(GitHubError::unprocessable_body("Search `items` must be an array")
                        .with_body(other))
                }
            };
            meta.items = items.clone();
            return Ok(values(items));
        }

        match body {
            Value::Array(items) => Ok(values(items)),
            Value::Object(mut page) => match &self.list_key {
                Some(key) => match page.remove(key) {
                    Some(Value::Array(items)) => Ok(values(items)),
                    Some(Value::Null) => Ok(VecDeque::new()),
                    Some(other) => Err(GitHubError::unprocessable_body(format!(
                        "Expected an array under {:?}",
                        key
                    ))
                    .with_body(other)),
                    None => Err(GitHubError::unprocessable_body(format!(
                        "Response page has no {:?} key",
                        key
                    ))
                    .with_body(Value::Object(page))),
                },
                None if T::ACCEPTS_ENTRIES => Ok(page
                    .into_iter()
                    .map(|(key, value)| RawItem::Entry(key, value))
                    .collect()),
                None => Err(GitHubError::unprocessable_body(
                    "Expected a JSON array of items but the response is an object",
                )
                .with_body(Value::Object(page))),
            },
            Value::Null => Ok(VecDeque::new()),
            other => Err(GitHubError::unprocessable_body("Expected a JSON array of items").with_body(other)),
        }
    }
}

fn values(items: Vec<Value>) -> VecDeque<RawItem> {
    items
        .into_iter()
        .filter(|item| !item.is_null())
        .map(RawItem::Value)
        .collect()
}

impl<T> fmt::Display for GitHubIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<GitHubIterator [{}, {}]>", self.original_count, self.url)
    }
}

impl<T> fmt::Debug for GitHubIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubIterator")
            .field("url", &self.url)
            .field("original_count", &self.original_count)
            .field("remaining", &self.remaining)
            .field("list_key", &self.list_key)
            .field("etag", &self.etag)
            .field("state", &self.state)
            .field("last_status", &self.last_status)
            .finish()
    }
}

/// Lazy traversal of search results.
///
/// Yields the entries of each page's `items` array and exposes the search
/// metadata reported so far.
pub struct SearchIterator<T> {
    inner: GitHubIterator<T>,
}

impl<T: Model> SearchIterator<T> {
    /// Creates a search iterator yielding up to `count` results.
    pub fn new(count: i64, url: impl Into<String>, core: GitHubCore) -> Self {
        Self {
            inner: GitHubIterator::new(count, url, core).for_search(),
        }
    }

    /// Adds a query parameter for the first request.
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.inner = self.inner.with_param(key, value);
        self
    }

    /// Sends `If-None-Match: etag` with the first request.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.inner = self.inner.with_etag(etag);
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.with_header(name, value);
        self
    }

    /// Gets the next result.
    pub async fn try_next(&mut self) -> GitHubResult<Option<T>> {
        self.inner.try_next().await
    }

    /// Restarts the search. See [`GitHubIterator::refresh`].
    ///
    /// The last page's `items` are dropped; `total_count` and
    /// `incomplete_results` keep their last reported values until a new page
    /// reports them.
    pub fn refresh(&mut self, conditional: bool) -> &mut Self {
        self.inner.refresh(conditional);
        self
    }

    /// Drains the iterator into a vector.
    pub async fn collect_all(self) -> GitHubResult<Vec<T>> {
        self.inner.collect_all().await
    }

    /// Converts the iterator into a stream of results.
    pub fn into_stream(self) -> impl Stream<Item = GitHubResult<T>> {
        self.inner.into_stream()
    }

    /// Total matches reported by the server so far.
    pub fn total_count(&self) -> Option<u64> {
        self.metadata().and_then(|m| m.total_count)
    }

    /// Whether the server reported the search as incomplete.
    pub fn incomplete_results(&self) -> Option<bool> {
        self.metadata().and_then(|m| m.incomplete_results)
    }

    /// Raw items of the most recent page.
    pub fn items(&self) -> &[Value] {
        self.metadata().map(|m| m.items.as_slice()).unwrap_or_default()
    }

    /// The underlying iterator.
    pub fn iterator(&self) -> &GitHubIterator<T> {
        &self.inner
    }

    fn metadata(&self) -> Option<&SearchPageMetadata> {
        self.inner.search.as_ref()
    }
}

impl<T> fmt::Display for SearchIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<SearchIterator [{}, {}]>",
            self.inner.original_count, self.inner.url
        )
    }
}

impl<T> fmt::Debug for SearchIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIterator")
            .field("inner", &self.inner)
            .field("metadata", &self.inner.search)
            .finish()
    }
}
