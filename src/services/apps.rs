//! GitHub Apps operations.

use crate::auth::InstallationToken;
use crate::client::GitHubClient;
use crate::errors::{GitHubError, GitHubResult};
use crate::pagination::GitHubIterator;
use crate::session::RequestOptions;
use crate::types::{Model, ShortRepository};
use serde_json::Value;

/// Service for GitHub App operations.
pub struct AppsService<'a> {
    client: &'a GitHubClient,
}

impl<'a> AppsService<'a> {
    /// Creates a new apps service.
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Gets the app the bearer JWT belongs to.
    pub async fn authenticated_app(&self) -> GitHubResult<Value> {
        self.client.session().require_app_bearer_auth()?;
        let core = self.client.core();
        core.fetch_model(&core.build_url(&["app"])).await
    }

    /// Exchanges an app JWT for an installation access token.
    ///
    /// The JWT is sent as a per-request bearer token; the session credential
    /// is left alone.
    pub async fn create_installation_token(&self, installation_id: u64, jwt: &str) -> GitHubResult<InstallationToken> {
        let core = self.client.core();
        let id = installation_id.to_string();
        let url = core.build_url(&["app", "installations", &id, "access_tokens"]);
        let options = RequestOptions::new().header("Authorization", format!("Bearer {}", jwt));
        let response = core.post(&url, options).await?;
        match core.to_json(&response, 201)? {
            Some(json) => InstallationToken::from_json(json, core),
            None => Err(GitHubError::unexpected_response(
                "The API returned an empty body for an installation token",
            )),
        }
    }

    /// Iterates over the repositories the installation can access.
    pub fn installation_repositories(&self, count: i64) -> GitHubResult<GitHubIterator<ShortRepository>> {
        self.client.session().require_app_installation_auth()?;
        let core = self.client.core();
        Ok(core
            .iterate(count, core.build_url(&["installation", "repositories"]))
            .with_list_key("repositories"))
    }
}
