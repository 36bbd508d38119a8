//! GitHub API client implementation.
//!
//! [`GitHubCore`] is the request facade shared by the client, iterators and
//! models: it issues requests through the [`Session`] and turns responses into
//! JSON, booleans and iterators. [`GitHubClient`] is the entry point built on
//! top of it.

use crate::auth::{create_app_jwt, Credential, InstallationToken, APP_JWT_MAX_TTL};
use crate::config::{GitHubConfig, GitHubConfigBuilder};
use crate::errors::{GitHubError, GitHubResult};
use crate::http::{HttpResponse, Transport};
use crate::observability::TracingHooks;
use crate::pagination::{GitHubIterator, SearchIterator};
use crate::services::*;
use crate::session::{RequestOptions, Session};
use crate::types::{Model, ETAG_KEY, LAST_MODIFIED_KEY};
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Request facade bound to a session.
///
/// Cloning is cheap; every clone shares the same session.
#[derive(Clone)]
pub struct GitHubCore {
    session: Arc<Session>,
}

impl fmt::Debug for GitHubCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubCore")
            .field("base_url", &self.session.base_url())
            .finish()
    }
}

impl GitHubCore {
    /// Creates a facade over a session.
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Gets the session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Joins the base URL with path segments.
    pub fn build_url(&self, segments: &[&str]) -> String {
        self.session.build_url(segments)
    }

    // HTTP verbs

    /// Issues a request through the session.
    pub async fn request(&self, method: Method, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.session.request(method, url, options).await
    }

    /// Issues a GET.
    pub async fn get(&self, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.request(Method::GET, url, options).await
    }

    /// Issues a POST.
    pub async fn post(&self, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.request(Method::POST, url, options).await
    }

    /// Issues a PATCH.
    pub async fn patch(&self, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.request(Method::PATCH, url, options).await
    }

    /// Issues a PUT.
    pub async fn put(&self, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.request(Method::PUT, url, options).await
    }

    /// Issues a DELETE.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        self.request(Method::DELETE, url, options).await
    }

    // Response conversion

    /// Converts a response into JSON.
    ///
    /// * the expected status parses the body; an empty body gives `None`
    /// * `>= 400` fails with the status-mapped error
    /// * `304` gives `None`
    /// * any other status is logged and the body parsed anyway
    ///
    /// When the body is an object, the response's `ETag` and `Last-Modified`
    /// headers are added to it under the keys of the same name.
    pub fn to_json(&self, response: &HttpResponse, expected_status: u16) -> GitHubResult<Option<Value>> {
        let mut json = self.decode_json(response, expected_status)?;
        if let Some(Value::Object(map)) = json.as_mut() {
            if let Some(etag) = response.etag() {
                map.insert(ETAG_KEY.to_string(), Value::String(etag.to_string()));
            }
            if let Some(last_modified) = response.last_modified() {
                map.insert(LAST_MODIFIED_KEY.to_string(), Value::String(last_modified.to_string()));
            }
        }
        Ok(json)
    }

    /// [`to_json`](Self::to_json) without the cache header injection.
    pub(crate) fn decode_json(&self, response: &HttpResponse, expected_status: u16) -> GitHubResult<Option<Value>> {
        let status = response.status();
        if status != expected_status {
            if status >= 400 {
                return Err(GitHubError::from_response(response));
            }
            if status == 304 {
                return Ok(None);
            }
            TracingHooks::on_status_mismatch(response.url(), expected_status, status);
        }

        if response.body().iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(response.body()).map(Some).map_err(|e| {
            GitHubError::unexpected_response(format!("Response body is not valid JSON: {}", e))
                .with_status(status)
                .with_cause(e)
        })
    }

    /// Converts a response into a boolean.
    ///
    /// `true_status` gives true and `false_status` false; `>= 400` fails with
    /// the status-mapped error; anything else is false.
    pub fn to_boolean(&self, response: &HttpResponse, true_status: u16, false_status: u16) -> GitHubResult<bool> {
        let status = response.status();
        if status == true_status {
            Ok(true)
        } else if status == false_status {
            Ok(false)
        } else if status >= 400 {
            Err(GitHubError::from_response(response))
        } else {
            Ok(false)
        }
    }

    /// GETs a URL and converts the response into JSON.
    pub async fn fetch_json(&self, url: &str, expected_status: u16) -> GitHubResult<Option<Value>> {
        let response = self.get(url, RequestOptions::new()).await?;
        self.to_json(&response, expected_status)
    }

    /// GETs a URL and builds a model from the body.
    pub async fn fetch_model<T: Model>(&self, url: &str) -> GitHubResult<T> {
        match self.fetch_json(url, 200).await? {
            Some(json) => T::from_json(json, self),
            None => Err(GitHubError::unexpected_response(format!(
                "The API returned an empty body for {}",
                url
            ))),
        }
    }

    /// GETs a URL conditionally on `etag`.
    ///
    /// Returns `None` when the server answers `304 Not Modified`.
    pub async fn fetch_model_if_modified<T: Model>(&self, url: &str, etag: Option<&str>) -> GitHubResult<Option<T>> {
        let mut options = RequestOptions::new();
        if let Some(etag) = etag {
            options = options.header("If-None-Match", etag);
        }
        let response = self.get(url, options).await?;
        self.to_json(&response, 200)?
            .map(|json| T::from_json(json, self))
            .transpose()
    }

    // Iterators

    /// Creates an iterator over a paginated collection.
    pub fn iterate<T: Model>(&self, count: i64, url: impl Into<String>) -> GitHubIterator<T> {
        GitHubIterator::new(count, url, self.clone())
    }

    /// Creates an iterator over a paginated search.
    pub fn search_iterate<T: Model>(&self, count: i64, url: impl Into<String>) -> SearchIterator<T> {
        SearchIterator::new(count, url, self.clone())
    }
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    core: GitHubCore,
}

impl GitHubClient {
    /// Creates a new GitHub client.
    pub fn new(config: GitHubConfig) -> GitHubResult<Self> {
        let session = Session::new(&config)?;
        Ok(Self::from_session(session))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(config: GitHubConfig, transport: Arc<dyn Transport>) -> GitHubResult<Self> {
        let session = Session::with_transport(&config, transport)?;
        Ok(Self::from_session(session))
    }

    fn from_session(session: Session) -> Self {
        Self {
            core: GitHubCore::new(Arc::new(session)),
        }
    }

    /// Creates a new client builder.
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::new()
    }

    /// Gets the request facade.
    pub fn core(&self) -> &GitHubCore {
        &self.core
    }

    /// Gets the session.
    pub fn session(&self) -> &Session {
        &self.core.session
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        self.core.session.base_url()
    }

    // Authentication

    /// Uses username/password authentication.
    pub fn login(&self, username: &str, password: &str) {
        self.session().configure_basic_auth(username, password);
    }

    /// Uses a static token.
    pub fn login_with_token(&self, token: &str) {
        self.session().configure_token_auth(token);
    }

    /// Authenticates as a GitHub App with a freshly signed JWT.
    pub fn login_as_app(&self, private_key_pem: &[u8], app_id: u64, expire_in: i64) -> GitHubResult<()> {
        self.session().login_as_app(private_key_pem, app_id, expire_in)
    }

    /// Authenticates as an installation of a GitHub App.
    ///
    /// Signs an app JWT, exchanges it for an installation token and uses that
    /// token until it expires. The exchange request carries only the JWT.
    pub async fn login_as_app_installation(
        &self,
        private_key_pem: &[u8],
        app_id: u64,
        installation_id: u64,
    ) -> GitHubResult<InstallationToken> {
        let (jwt, _) = create_app_jwt(private_key_pem, app_id, APP_JWT_MAX_TTL)?;
        let token = {
            let _anonymous = self.session().no_auth();
            self.apps().create_installation_token(installation_id, &jwt).await?
        };
        self.session().set_credential(Some(token.clone().into_credential()));
        Ok(token)
    }

    /// Registers the callback asked for a one-time code on a 2FA challenge.
    pub fn set_two_factor_callback<F>(&self, callback: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.session().register_two_factor_callback(callback);
    }

    // Service accessors

    /// Gets the users service.
    pub fn users(&self) -> UsersService {
        UsersService::new(self)
    }

    /// Gets the repositories service.
    pub fn repositories(&self) -> RepositoriesService {
        RepositoriesService::new(self)
    }

    /// Gets the search service.
    pub fn search(&self) -> SearchService {
        SearchService::new(self)
    }

    /// Gets the GitHub Apps service.
    pub fn apps(&self) -> AppsService {
        AppsService::new(self)
    }

    /// Gets the meta service.
    pub fn meta(&self) -> MetaService {
        MetaService::new(self)
    }
}

/// Builder for GitHubClient.
#[derive(Default)]
pub struct GitHubClientBuilder {
    config_builder: GitHubConfigBuilder,
    transport: Option<Arc<dyn Transport>>,
}

impl GitHubClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(url);
        self
    }

    /// Sets the initial credential.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.config_builder = self.config_builder.credential(credential);
        self
    }

    /// Uses a static token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.token(token);
        self
    }

    /// Uses username/password authentication.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.basic_auth(username, password);
        self
    }

    /// Sets the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Sets the User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Sets the API version header.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_version(version);
        self
    }

    /// Sends requests through a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> GitHubResult<GitHubClient> {
        let config = self.config_builder.build()?;
        match self.transport {
            Some(transport) => GitHubClient::with_transport(config, transport),
            None => GitHubClient::new(config),
        }
    }
}
