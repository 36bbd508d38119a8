use super::{hydrate, CacheInfo, JsonBacked, Model};
use crate::client::GitHubCore;
use crate::errors::{GitHubError, GitHubResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A user as it appears in listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortUser {
    /// User ID.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// API URL of the full user.
    pub url: String,
    /// Profile URL.
    pub html_url: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// `User`, `Organization` or `Bot`.
    #[serde(rename = "type")]
    pub user_type: Option<String>,
    /// Whether the user is a site administrator.
    #[serde(default)]
    pub site_admin: bool,
    #[serde(skip)]
    raw: Value,
    #[serde(skip)]
    cache: CacheInfo,
    #[serde(skip)]
    core: Option<GitHubCore>,
}

impl ShortUser {
    /// Fetches the full representation of this user.
    pub async fn fetch_full(&self) -> GitHubResult<User> {
        bound_core(&self.core)?.fetch_model(&self.url).await
    }
}

impl Model for ShortUser {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (mut user, raw, cache): (Self, _, _) = hydrate(json, "ShortUser", &["id", "login", "url"])?;
        user.raw = raw;
        user.cache = cache;
        user.core = Some(core.clone());
        Ok(user)
    }
}

impl JsonBacked for ShortUser {
    fn raw(&self) -> &Value {
        &self.raw
    }

    fn cache_info(&self) -> &CacheInfo {
        &self.cache
    }
}

/// The full representation of a user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User ID.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// API URL.
    pub url: String,
    /// Profile URL.
    pub html_url: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// `User`, `Organization` or `Bot`.
    #[serde(rename = "type")]
    pub user_type: Option<String>,
    /// Whether the user is a site administrator.
    #[serde(default)]
    pub site_admin: bool,
    /// Display name.
    pub name: Option<String>,
    /// Company.
    pub company: Option<String>,
    /// Blog URL.
    pub blog: Option<String>,
    /// Location.
    pub location: Option<String>,
    /// Public email.
    pub email: Option<String>,
    /// Bio.
    pub bio: Option<String>,
    /// Number of public repositories.
    pub public_repos: Option<u32>,
    /// Number of followers.
    pub followers: Option<u32>,
    /// Number of users followed.
    pub following: Option<u32>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    raw: Value,
    #[serde(skip)]
    cache: CacheInfo,
    #[serde(skip)]
    core: Option<GitHubCore>,
}

impl User {
    /// Fetches the user again unless it is unchanged since it was fetched.
    ///
    /// Returns `None` when the server confirms nothing changed.
    pub async fn refresh_if_modified(&self) -> GitHubResult<Option<User>> {
        bound_core(&self.core)?
            .fetch_model_if_modified(&self.url, self.etag())
            .await
    }
}

impl Model for User {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (mut user, raw, cache): (Self, _, _) = hydrate(json, "User", &["id", "login", "url"])?;
        user.raw = raw;
        user.cache = cache;
        user.core = Some(core.clone());
        Ok(user)
    }
}

impl JsonBacked for User {
    fn raw(&self) -> &Value {
        &self.raw
    }

    fn cache_info(&self) -> &CacheInfo {
        &self.cache
    }
}

pub(super) fn bound_core(core: &Option<GitHubCore>) -> GitHubResult<&GitHubCore> {
    core.as_ref()
        .ok_or_else(|| GitHubError::invalid_request("Object is not bound to a session"))
}
