use super::users::bound_core;
use super::{hydrate, CacheInfo, JsonBacked, Model};
use crate::client::GitHubCore;
use crate::errors::GitHubResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Owner summary embedded in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Owner ID.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// `User` or `Organization`.
    #[serde(rename = "type")]
    pub owner_type: Option<String>,
}

/// A repository as it appears in listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortRepository {
    /// Repository ID.
    pub id: u64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Owner.
    pub owner: Owner,
    /// API URL of the full repository.
    pub url: String,
    /// Web URL.
    pub html_url: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Whether the repository is a fork.
    #[serde(default)]
    pub fork: bool,
    #[serde(skip)]
    raw: Value,
    #[serde(skip)]
    cache: CacheInfo,
    #[serde(skip)]
    core: Option<GitHubCore>,
}

impl ShortRepository {
    /// Fetches the full representation of this repository.
    pub async fn fetch_full(&self) -> GitHubResult<Repository> {
        bound_core(&self.core)?.fetch_model(&self.url).await
    }
}

impl Model for ShortRepository {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (mut repo, raw, cache): (Self, _, _) =
            hydrate(json, "ShortRepository", &["id", "name", "full_name", "owner", "url"])?;
        repo.raw = raw;
        repo.cache = cache;
        repo.core = Some(core.clone());
        Ok(repo)
    }
}

impl JsonBacked for ShortRepository {
    fn raw(&self) -> &Value {
        &self.raw
    }

    fn cache_info(&self) -> &CacheInfo {
        &self.cache
    }
}

/// The full representation of a repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository ID.
    pub id: u64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Owner.
    pub owner: Owner,
    /// API URL.
    pub url: String,
    /// Web URL.
    pub html_url: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Whether the repository is a fork.
    #[serde(default)]
    pub fork: bool,
    /// Default branch.
    pub default_branch: Option<String>,
    /// Primary language.
    pub language: Option<String>,
    /// Fork count.
    #[serde(default)]
    pub forks_count: u32,
    /// Star count.
    #[serde(default)]
    pub stargazers_count: u32,
    /// Watcher count.
    #[serde(default)]
    pub watchers_count: u32,
    /// Open issue count.
    #[serde(default)]
    pub open_issues_count: u32,
    /// Topics.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Whether the repository is archived.
    #[serde(default)]
    pub archived: bool,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Last push time.
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    raw: Value,
    #[serde(skip)]
    cache: CacheInfo,
    #[serde(skip)]
    core: Option<GitHubCore>,
}

impl Repository {
    /// Fetches the repository again unless it is unchanged since it was fetched.
    pub async fn refresh_if_modified(&self) -> GitHubResult<Option<Repository>> {
        bound_core(&self.core)?
            .fetch_model_if_modified(&self.url, self.etag())
            .await
    }
}

impl Model for Repository {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (mut repo, raw, cache): (Self, _, _) =
            hydrate(json, "Repository", &["id", "name", "full_name", "owner", "url"])?;
        repo.raw = raw;
        repo.cache = cache;
        repo.core = Some(core.clone());
        Ok(repo)
    }
}

impl JsonBacked for Repository {
    fn raw(&self) -> &Value {
        &self.raw
    }

    fn cache_info(&self) -> &CacheInfo {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::errors::GitHubErrorKind;
    use crate::mocks::{MockResponse, ScriptedTransport};
    use crate::session::Session;
    use serde_json::json;
    use std::sync::Arc;

    fn core_over(transport: Arc<ScriptedTransport>) -> GitHubCore {
        let session = Session::with_transport(&GitHubConfig::default(), transport).unwrap();
        GitHubCore::new(Arc::new(session))
    }

    fn hello_world() -> Value {
        json!({
            "id": 1296269,
            "name": "Hello-World",
            "full_name": "octocat/Hello-World",
            "owner": {"login": "octocat", "id": 1, "type": "User"},
            "private": false,
            "html_url": "https://github.com/octocat/Hello-World",
            "description": "This your first repo!",
            "fork": false,
            "url": "https://api.github.com/repos/octocat/Hello-World"
        })
    }

    #[test]
    fn test_short_repository_round_trips() {
        let core = core_over(Arc::new(ScriptedTransport::new()));
        let repo = ShortRepository::from_json(hello_world(), &core).unwrap();
        assert_eq!(repo.full_name, "octocat/Hello-World");
        assert_eq!(repo.owner.login, "octocat");
        assert_eq!(repo.as_json(), hello_world().to_string());
        assert_eq!(repo.etag(), None);
    }

    #[test]
    fn test_missing_owner_is_incomplete() {
        let core = core_over(Arc::new(ScriptedTransport::new()));
        let mut json = hello_world();
        json.as_object_mut().unwrap().remove("owner");
        let err = ShortRepository::from_json(json, &core).unwrap_err();
        assert_eq!(err.kind(), GitHubErrorKind::IncompleteResponse);
    }

    #[tokio::test]
    async fn test_fetch_full() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut full = hello_world();
        full["default_branch"] = json!("main");
        full["stargazers_count"] = json!(80);
        full["topics"] = json!(["octocat", "api"]);
        full["pushed_at"] = json!("2011-01-26T19:06:43Z");
        transport.push(MockResponse::ok(&full));
        let core = core_over(transport);

        let repo = ShortRepository::from_json(hello_world(), &core)
            .unwrap()
            .fetch_full()
            .await
            .unwrap();
        assert_eq!(repo.default_branch.as_deref(), Some("main"));
        assert_eq!(repo.stargazers_count, 80);
        assert_eq!(repo.topics, vec!["octocat", "api"]);
        assert!(repo.pushed_at.is_some());
    }
}
