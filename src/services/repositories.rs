//! Repository operations.

use crate::client::GitHubClient;
use crate::errors::GitHubResult;
use crate::pagination::GitHubIterator;
use crate::session::RequestOptions;
use crate::types::{Language, Repository, ShortRepository, ShortUser};

/// Service for repository operations.
pub struct RepositoriesService<'a> {
    client: &'a GitHubClient,
}

impl<'a> RepositoriesService<'a> {
    /// Creates a new repositories service.
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Gets a repository.
    pub async fn get(&self, owner: &str, repo: &str) -> GitHubResult<Repository> {
        let core = self.client.core();
        core.fetch_model(&core.build_url(&["repos", owner, repo])).await
    }

    /// Iterates over a user's public repositories.
    ///
    /// `repo_type` is one of `all`, `owner` or `member`.
    pub fn list_for_user(&self, username: &str, repo_type: Option<&str>, count: i64) -> GitHubIterator<ShortRepository> {
        let core = self.client.core();
        let iter = core.iterate(count, core.build_url(&["users", username, "repos"]));
        match repo_type {
            Some(repo_type) => iter.with_param("type", repo_type),
            None => iter,
        }
    }

    /// Iterates over the repositories of the authenticated user.
    pub fn list_own(&self, count: i64) -> GitHubResult<GitHubIterator<ShortRepository>> {
        self.client.session().require_auth()?;
        let core = self.client.core();
        Ok(core.iterate(count, core.build_url(&["user", "repos"])))
    }

    /// Iterates over a repository's language breakdown.
    pub fn languages(&self, owner: &str, repo: &str) -> GitHubIterator<Language> {
        let core = self.client.core();
        core.iterate(-1, core.build_url(&["repos", owner, repo, "languages"]))
    }

    /// Iterates over the users who starred a repository.
    pub fn stargazers(&self, owner: &str, repo: &str, count: i64) -> GitHubIterator<ShortUser> {
        let core = self.client.core();
        core.iterate(count, core.build_url(&["repos", owner, repo, "stargazers"]))
    }

    /// Checks whether the authenticated user starred a repository.
    pub async fn is_starred(&self, owner: &str, repo: &str) -> GitHubResult<bool> {
        self.client.session().require_auth()?;
        let core = self.client.core();
        let url = core.build_url(&["user", "starred", owner, repo]);
        let response = core.get(&url, RequestOptions::new()).await?;
        core.to_boolean(&response, 204, 404)
    }
}
