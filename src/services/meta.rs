//! Miscellaneous endpoints.

use crate::client::GitHubClient;
use crate::errors::GitHubResult;
use crate::pagination::GitHubIterator;
use crate::types::{Emoji, RateLimit};

/// Service for miscellaneous endpoints.
pub struct MetaService<'a> {
    client: &'a GitHubClient,
}

impl<'a> MetaService<'a> {
    /// Creates a new meta service.
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Gets the caller's rate limit status. Does not count against it.
    pub async fn rate_limit(&self) -> GitHubResult<RateLimit> {
        let core = self.client.core();
        core.fetch_model(&core.build_url(&["rate_limit"])).await
    }

    /// Iterates over the emojis available on GitHub.
    pub fn emojis(&self) -> GitHubIterator<Emoji> {
        let core = self.client.core();
        core.iterate(-1, core.build_url(&["emojis"]))
    }
}
