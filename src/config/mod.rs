//! Configuration types for the GitHub client.

use crate::auth::Credential;
use crate::errors::GitHubError;
use std::time::Duration;

/// Default GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Default GitHub API version (date-based).
pub const DEFAULT_API_VERSION: &str = "2022-11-28";

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = concat!("integrations-github-rest/", env!("CARGO_PKG_VERSION"));

/// Environment variable overriding the base URL.
pub const ENV_API_URL: &str = "GITHUB_API_URL";

/// Environment variable holding a token.
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";

/// GitHub client configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL.
    pub base_url: String,
    /// API version header.
    pub api_version: String,
    /// Initial credential.
    pub credential: Option<Credential>,
    /// Read timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            credential: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl GitHubConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> GitHubConfigBuilder {
        GitHubConfigBuilder::new()
    }

    /// Builds a configuration from `GITHUB_API_URL` and `GITHUB_TOKEN`.
    ///
    /// Unset variables fall back to the defaults; an empty token is ignored.
    pub fn from_env() -> Result<Self, GitHubError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            builder = builder.base_url(url);
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.is_empty() {
                builder = builder.token(token);
            }
        }
        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GitHubError> {
        if self.base_url.is_empty() {
            return Err(GitHubError::configuration("Base URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GitHubError::configuration(
                "Base URL must start with http:// or https://",
            ));
        }

        if self.user_agent.is_empty() {
            return Err(GitHubError::configuration("User-Agent is required by GitHub API"));
        }

        Ok(())
    }
}

/// Builder for GitHubConfig.
#[derive(Debug, Default)]
pub struct GitHubConfigBuilder {
    base_url: Option<String>,
    api_version: Option<String>,
    credential: Option<Credential>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl GitHubConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the initial credential.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Uses a static token.
    pub fn token(self, token: impl Into<String>) -> Self {
        self.credential(Credential::token(token))
    }

    /// Uses username/password authentication.
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential(Credential::basic(username, password))
    }

    /// Sets the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<GitHubConfig, GitHubError> {
        let config = GitHubConfig {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_version: self.api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            credential: self.credential,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
