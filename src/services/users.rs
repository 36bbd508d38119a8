//! User operations.

use crate::client::GitHubClient;
use crate::errors::GitHubResult;
use crate::pagination::GitHubIterator;
use crate::session::RequestOptions;
use crate::types::{ShortUser, User};

/// Service for user operations.
pub struct UsersService<'a> {
    client: &'a GitHubClient,
}

impl<'a> UsersService<'a> {
    /// Creates a new users service.
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Gets the authenticated user.
    pub async fn get_authenticated(&self) -> GitHubResult<User> {
        self.client.session().require_auth()?;
        let core = self.client.core();
        core.fetch_model(&core.build_url(&["user"])).await
    }

    /// Gets a user by username.
    pub async fn get(&self, username: &str) -> GitHubResult<User> {
        let core = self.client.core();
        core.fetch_model(&core.build_url(&["users", username])).await
    }

    /// Iterates over every user, in sign-up order.
    ///
    /// `since` is the ID of the last user already seen.
    pub fn all(&self, count: i64, since: Option<u64>) -> GitHubIterator<ShortUser> {
        let core = self.client.core();
        let iter = core.iterate(count, core.build_url(&["users"]));
        match since {
            Some(since) => iter.with_param("since", since),
            None => iter,
        }
    }

    /// Iterates over a user's followers.
    pub fn followers_of(&self, username: &str, count: i64) -> GitHubIterator<ShortUser> {
        let core = self.client.core();
        core.iterate(count, core.build_url(&["users", username, "followers"]))
    }

    /// Iterates over the users a user follows.
    pub fn followed_by(&self, username: &str, count: i64) -> GitHubIterator<ShortUser> {
        let core = self.client.core();
        core.iterate(count, core.build_url(&["users", username, "following"]))
    }

    /// Checks whether `username` follows `target`.
    pub async fn is_following(&self, username: &str, target: &str) -> GitHubResult<bool> {
        let core = self.client.core();
        let url = core.build_url(&["users", username, "following", target]);
        let response = core.get(&url, RequestOptions::new()).await?;
        core.to_boolean(&response, 204, 404)
    }

    /// Follows a user as the authenticated user.
    pub async fn follow(&self, username: &str) -> GitHubResult<bool> {
        self.client.session().require_auth()?;
        let core = self.client.core();
        let url = core.build_url(&["user", "following", username]);
        let response = core.put(&url, RequestOptions::new()).await?;
        core.to_boolean(&response, 204, 404)
    }

    /// Unfollows a user as the authenticated user.
    pub async fn unfollow(&self, username: &str) -> GitHubResult<bool> {
        self.client.session().require_auth()?;
        let core = self.client.core();
        let url = core.build_url(&["user", "following", username]);
        let response = core.delete(&url, RequestOptions::new()).await?;
        core.to_boolean(&response, 204, 404)
    }
}
