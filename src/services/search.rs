//! GitHub Search API operations.

use crate::client::GitHubClient;
use crate::pagination::SearchIterator;
use crate::types::{Model, RepositorySearchResult, UserSearchResult};

/// Media type that adds `text_matches` to each result.
pub const TEXT_MATCH_MEDIA_TYPE: &str = "application/vnd.github.text-match+json";

/// Service for search operations.
pub struct SearchService<'a> {
    client: &'a GitHubClient,
}

impl<'a> SearchService<'a> {
    /// Creates a new search service.
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Searches repositories.
    pub fn repositories(&self, query: &str, count: i64) -> SearchIterator<RepositorySearchResult> {
        self.repositories_with_params(query, &SearchParams::default(), count)
    }

    /// Searches repositories with parameters.
    pub fn repositories_with_params(
        &self,
        query: &str,
        params: &SearchParams,
        count: i64,
    ) -> SearchIterator<RepositorySearchResult> {
        self.search("repositories", query, params, count)
    }

    /// Searches users.
    pub fn users(&self, query: &str, count: i64) -> SearchIterator<UserSearchResult> {
        self.users_with_params(query, &SearchParams::default(), count)
    }

    /// Searches users with parameters.
    pub fn users_with_params(&self, query: &str, params: &SearchParams, count: i64) -> SearchIterator<UserSearchResult> {
        self.search("users", query, params, count)
    }

    fn search<T: Model>(&self, kind: &str, query: &str, params: &SearchParams, count: i64) -> SearchIterator<T> {
        let core = self.client.core();
        let mut iter = core
            .search_iterate(count, core.build_url(&["search", kind]))
            .with_param("q", query);
        if let Some(sort) = &params.sort {
            iter = iter.with_param("sort", sort);
        }
        if let Some(order) = params.order {
            iter = iter.with_param("order", order.as_str());
        }
        if params.text_match {
            iter = iter.with_header("Accept", TEXT_MATCH_MEDIA_TYPE);
        }
        iter
    }
}

/// Common search parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Sort field.
    pub sort: Option<String>,
    /// Sort order.
    pub order: Option<SearchOrder>,
    /// Requests match metadata for every result.
    pub text_match: bool,
}

impl SearchParams {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort field.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the sort order.
    pub fn order(mut self, order: SearchOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Requests text match metadata.
    pub fn text_match(mut self) -> Self {
        self.text_match = true;
        self
    }
}

/// Search sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SearchOrder {
    /// Query string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockResponse, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_users_with_params() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::ok(&json!({
            "total_count": 1,
            "incomplete_results": false,
            "items": [{
                "login": "mojombo",
                "id": 1,
                "url": "https://api.github.com/users/mojombo",
                "score": 1.0,
                "text_matches": []
            }]
        })));
        let client = crate::GitHubClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();

        let params = SearchParams::new().sort("followers").order(SearchOrder::Desc).text_match();
        let mut results = client.search().users_with_params("tom repos:>42", &params, 10);
        let hit = results.try_next().await.unwrap().unwrap();
        assert_eq!(hit.user.login, "mojombo");
        assert!(results.try_next().await.unwrap().is_none());
        assert_eq!(results.total_count(), Some(1));

        let sent = &transport.requests()[0];
        assert_eq!(
            sent.full_url(),
            "https://api.github.com/search/users?q=tom+repos%3A%3E42&sort=followers&order=desc&per_page=10"
        );
        assert_eq!(sent.header("accept"), Some(TEXT_MATCH_MEDIA_TYPE));
    }
}
