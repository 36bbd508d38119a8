//! The authenticated HTTP session every request goes through.
//!
//! A [`Session`] owns the active [`Credential`], default timeouts and default
//! headers, counts requests, and transparently answers two-factor challenges
//! when a callback is registered. It is shared by `Arc` between the client,
//! iterators and models.
//!
//! The credential slot is shared mutable state. Swapping it (including the
//! scoped [`Session::temporary_basic_auth`] and [`Session::no_auth`] guards)
//! while other tasks issue requests on the same session affects those requests
//! too.

use crate::auth::{create_app_jwt, Credential, CredentialKind};
use crate::config::GitHubConfig;
use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use crate::http::{HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Timeouts, Transport, OTP_HEADER};
use crate::observability::TracingHooks;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback producing a one-time two-factor code.
pub type TwoFactorCallback = Arc<dyn Fn() -> String + Send + Sync>;

/// Upper bound on memoized URLs before the cache is flushed.
const URL_CACHE_CAPACITY: usize = 2048;

static URL_CACHE: Lazy<Mutex<HashMap<(String, Vec<String>), String>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Joins a base URL with path segments.
///
/// Slashes at the joints are normalized and empty segments skipped. Results
/// are memoized process-wide in a bounded cache.
pub fn build_url(base_url: &str, segments: &[&str]) -> String {
    let key = (
        base_url.to_string(),
        segments.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    );
    if let Some(hit) = URL_CACHE.lock().get(&key) {
        return hit.clone();
    }

    let mut url = base_url.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(segment);
    }

    let mut cache = URL_CACHE.lock();
    if cache.len() >= URL_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(key, url.clone());
    url
}

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters.
    pub params: Vec<(String, String)>,
    /// Headers, applied after the session defaults and credential.
    pub headers: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<RequestBody>,
    /// Read timeout override.
    pub timeout: Option<Duration>,
    /// Connect timeout override.
    pub connect_timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Sets a form body.
    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(pairs));
        self
    }

    /// Overrides the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Authenticated HTTP session.
pub struct Session {
    base_url: String,
    default_headers: HeaderMap,
    timeouts: Timeouts,
    credential: RwLock<Option<Credential>>,
    two_factor_callback: RwLock<Option<TwoFactorCallback>>,
    request_counter: AtomicU64,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .field("credential", &self.credential_kind())
            .field("two_factor_callback", &self.two_factor_callback.read().is_some())
            .field("request_count", &self.request_count())
            .finish()
    }
}

impl Session {
    /// Creates a session backed by reqwest.
    pub fn new(config: &GitHubConfig) -> GitHubResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.connect_timeout)?);
        Self::with_transport(config, transport)
    }

    /// Creates a session over a custom transport.
    pub fn with_transport(config: &GitHubConfig, transport: Arc<dyn Transport>) -> GitHubResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        default_headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        default_headers.insert("x-github-api-version", header_value(&config.api_version)?);

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_headers,
            timeouts: Timeouts {
                connect: config.connect_timeout,
                read: config.timeout,
            },
            credential: RwLock::new(config.credential.clone()),
            two_factor_callback: RwLock::new(None),
            request_counter: AtomicU64::new(0),
            transport,
        })
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Gets the default timeouts.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Number of requests sent so far, two-factor retries included.
    pub fn request_count(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }

    /// Joins the session base URL with path segments.
    pub fn build_url(&self, segments: &[&str]) -> String {
        build_url(&self.base_url, segments)
    }

    // Credential management

    /// Replaces the credential with basic auth. No-op if either part is empty.
    pub fn configure_basic_auth(&self, username: &str, password: &str) {
        if username.is_empty() || password.is_empty() {
            return;
        }
        self.set_credential(Some(Credential::basic(username, password)));
    }

    /// Replaces the credential with a static token. No-op if empty.
    pub fn configure_token_auth(&self, token: &str) {
        if token.is_empty() {
            return;
        }
        self.set_credential(Some(Credential::token(token)));
    }

    /// Replaces the credential with a GitHub App bearer token valid for `ttl`.
    pub fn configure_app_bearer_auth(&self, token: &str, ttl: ChronoDuration) {
        self.set_credential(Some(Credential::app_bearer(token, ttl)));
    }

    /// Replaces the credential with an installation token valid until `expires_at`.
    pub fn configure_app_installation_auth(&self, token: &str, expires_at: DateTime<Utc>) {
        self.set_credential(Some(Credential::app_installation(token, expires_at)));
    }

    /// Signs a GitHub App JWT and uses it as the bearer credential.
    pub fn login_as_app(&self, private_key_pem: &[u8], app_id: u64, expire_in: i64) -> GitHubResult<()> {
        let (token, ttl) = create_app_jwt(private_key_pem, app_id, expire_in)?;
        self.set_credential(Some(Credential::app_bearer(token, ttl)));
        Ok(())
    }

    /// Replaces (or clears) the credential.
    pub fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.write() = credential;
    }

    /// Returns true if any credential is configured.
    pub fn has_auth(&self) -> bool {
        self.credential.read().is_some()
    }

    /// Gets the kind of the active credential.
    pub fn credential_kind(&self) -> Option<CredentialKind> {
        self.credential.read().as_ref().map(Credential::kind)
    }

    /// Swaps in basic auth until the returned guard is dropped.
    ///
    /// The prior credential, or its absence, is restored on every exit path.
    pub fn temporary_basic_auth(&self, username: &str, password: &str) -> AuthGuard<'_> {
        let previous = self.credential.read().clone();
        self.configure_basic_auth(username, password);
        AuthGuard {
            session: self,
            previous: Some(previous),
        }
    }

    /// Removes all credentials until the returned guard is dropped.
    pub fn no_auth(&self) -> AuthGuard<'_> {
        let previous = self.credential.write().take();
        AuthGuard {
            session: self,
            previous: Some(previous),
        }
    }

    // Operation gating

    /// Fails unless some credential is configured.
    pub fn require_auth(&self) -> GitHubResult<()> {
        if self.has_auth() {
            Ok(())
        } else {
            Err(GitHubError::new(
                GitHubErrorKind::AuthenticationRequired,
                "This operation requires authentication",
            ))
        }
    }

    /// Fails unless basic auth is configured.
    pub fn require_basic_auth(&self) -> GitHubResult<()> {
        self.require_kind(
            CredentialKind::Basic,
            GitHubErrorKind::BasicAuthRequired,
            "This operation requires username/password authentication",
        )
    }

    /// Fails unless a GitHub App bearer token is configured.
    pub fn require_app_bearer_auth(&self) -> GitHubResult<()> {
        self.require_kind(
            CredentialKind::AppBearer,
            GitHubErrorKind::AppBearerAuthRequired,
            "This operation requires GitHub App authentication",
        )
    }

    /// Fails unless a GitHub App installation token is configured.
    pub fn require_app_installation_auth(&self) -> GitHubResult<()> {
        self.require_kind(
            CredentialKind::AppInstallation,
            GitHubErrorKind::AppInstallationAuthRequired,
            "This operation requires GitHub App installation authentication",
        )
    }

    fn require_kind(&self, wanted: CredentialKind, kind: GitHubErrorKind, message: &str) -> GitHubResult<()> {
        if self.credential_kind() == Some(wanted) {
            Ok(())
        } else {
            Err(GitHubError::new(kind, message))
        }
    }

    // Two-factor

    /// Registers the callback asked for a one-time code on a 2FA challenge.
    pub fn register_two_factor_callback<F>(&self, callback: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        *self.two_factor_callback.write() = Some(Arc::new(callback));
    }

    /// Removes the two-factor callback.
    pub fn clear_two_factor_callback(&self) {
        *self.two_factor_callback.write() = None;
    }

    // Requests

    /// Issues a request. Every HTTP call in the crate goes through here.
    ///
    /// Relative URLs are resolved against the base URL. An expired app
    /// credential fails before anything is sent. A two-factor challenge is
    /// answered at most once, and only when a callback is registered; the
    /// challenged response is then kept in the returned response's history.
    pub async fn request(&self, method: Method, url: &str, options: RequestOptions) -> GitHubResult<HttpResponse> {
        let request = self.prepare(method, url, options)?;
        let response = self.dispatch(request.clone()).await?;

        if !response.is_otp_required() {
            return Ok(response);
        }

        let callback = self.two_factor_callback.read().clone();
        TracingHooks::on_two_factor_challenge(&request.url, callback.is_some());
        let Some(callback) = callback else {
            return Ok(response);
        };

        let mut retry = request;
        let mut code = header_value(&callback())?;
        code.set_sensitive(true);
        retry.headers.insert(OTP_HEADER, code);

        let mut retried = self.dispatch(retry).await?;
        retried.push_history(response);
        Ok(retried)
    }

    fn prepare(&self, method: Method, url: &str, options: RequestOptions) -> GitHubResult<HttpRequest> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.build_url(&[url])
        };

        let mut headers = self.default_headers.clone();
        if let Some(credential) = self.credential.read().as_ref() {
            let mut value = header_value(&credential.authorization()?)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                GitHubError::invalid_request(format!("Invalid header name {:?}: {}", name, e)).with_cause(e)
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            query: options.params,
            body: options.body,
            timeouts: Timeouts {
                connect: options.connect_timeout.unwrap_or(self.timeouts.connect),
                read: options.timeout.unwrap_or(self.timeouts.read),
            },
        })
    }

    async fn dispatch(&self, request: HttpRequest) -> GitHubResult<HttpResponse> {
        let attempt = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let method = request.method.to_string();
        let url = request.full_url();
        TracingHooks::on_request_start(&method, &url, attempt);

        let started = Instant::now();
        match self.transport.send(request).await {
            Ok(response) => {
                TracingHooks::on_request_complete(&method, &url, response.status(), started.elapsed());
                Ok(response)
            }
            Err(error) => {
                TracingHooks::on_request_error(&method, &url, &error.to_string());
                Err(error)
            }
        }
    }
}

/// Restores the session's previous credential when dropped.
#[must_use = "the previous credential is restored as soon as the guard is dropped"]
pub struct AuthGuard<'a> {
    session: &'a Session,
    previous: Option<Option<Credential>>,
}

impl AuthGuard<'_> {
    /// Gets the session the guard applies to.
    pub fn session(&self) -> &Session {
        self.session
    }
}

impl Drop for AuthGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.session.set_credential(previous);
        }
    }
}

fn header_value(value: &str) -> GitHubResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        GitHubError::invalid_request(format!("Invalid header value: {}", e)).with_cause(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::mocks::{MockResponse, ScriptedTransport};

    fn session_over(transport: Arc<dyn Transport>) -> Session {
        Session::with_transport(&GitHubConfig::default(), transport).unwrap()
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url("https://api.github.com", &["repos", "octocat", "hello"]),
            "https://api.github.com/repos/octocat/hello"
        );
        assert_eq!(
            build_url("https://ghe.example.com/api/v3/", &["/users/", "", "octocat"]),
            "https://ghe.example.com/api/v3/users/octocat"
        );
        // memoized path returns the same value
        assert_eq!(
            build_url("https://api.github.com", &["repos", "octocat", "hello"]),
            "https://api.github.com/repos/octocat/hello"
        );
    }

    #[test]
    fn test_configure_ignores_empty_values() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        session.configure_token_auth("");
        assert!(!session.has_auth());
        session.configure_basic_auth("octocat", "");
        assert!(!session.has_auth());

        session.configure_token_auth("ghp_x");
        session.configure_basic_auth("", "pw");
        assert_eq!(session.credential_kind(), Some(CredentialKind::Token));
    }

    #[test]
    fn test_new_credential_replaces_old() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        session.configure_token_auth("ghp_x");
        session.configure_basic_auth("octocat", "pw");
        assert_eq!(session.credential_kind(), Some(CredentialKind::Basic));
    }

    #[test]
    fn test_temporary_basic_auth_restores_previous() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        session.configure_token_auth("ghp_x");
        {
            let _guard = session.temporary_basic_auth("octocat", "pw");
            assert_eq!(session.credential_kind(), Some(CredentialKind::Basic));
        }
        assert_eq!(session.credential_kind(), Some(CredentialKind::Token));
    }

    #[test]
    fn test_temporary_basic_auth_restores_none() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        {
            let _guard = session.temporary_basic_auth("octocat", "pw");
            assert!(session.has_auth());
        }
        assert!(!session.has_auth());
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn failing(session: &Session) -> GitHubResult<()> {
            let _guard = session.no_auth();
            session.require_auth()?;
            Ok(())
        }

        let session = session_over(Arc::new(ScriptedTransport::new()));
        session.configure_token_auth("ghp_x");
        let err = failing(&session).unwrap_err();
        assert_eq!(err.kind(), GitHubErrorKind::AuthenticationRequired);
        assert_eq!(session.credential_kind(), Some(CredentialKind::Token));
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        session.configure_token_auth("ghp_x");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = session.temporary_basic_auth("octocat", "pw");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(session.credential_kind(), Some(CredentialKind::Token));
    }

    #[test]
    fn test_gating() {
        let session = session_over(Arc::new(ScriptedTransport::new()));
        assert_eq!(
            session.require_auth().unwrap_err().kind(),
            GitHubErrorKind::AuthenticationRequired
        );

        session.configure_token_auth("ghp_x");
        assert!(session.require_auth().is_ok());
        assert_eq!(
            session.require_basic_auth().unwrap_err().kind(),
            GitHubErrorKind::BasicAuthRequired
        );
        assert_eq!(
            session.require_app_bearer_auth().unwrap_err().kind(),
            GitHubErrorKind::AppBearerAuthRequired
        );

        session.configure_app_installation_auth("ghs_x", Utc::now() + ChronoDuration::hours(1));
        assert!(session.require_app_installation_auth().is_ok());
    }

    #[tokio::test]
    async fn test_expired_credential_never_reaches_transport() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let session = session_over(Arc::new(transport));
        session.configure_app_bearer_auth("jwt", ChronoDuration::seconds(-1));

        let err = session
            .request(Method::GET, "/app", RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GitHubErrorKind::AppTokenExpired);
        assert_eq!(session.request_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_bearer_ttl_still_sends() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::ok(&serde_json::json!({"id": 1})));
        let session = session_over(transport.clone());
        session.configure_app_bearer_auth("jwt", ChronoDuration::days(365 * 1_000_000));

        let response = session
            .request(Method::GET, "/app", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer jwt"));
    }

    #[tokio::test]
    async fn test_request_applies_defaults_and_auth() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .withf(|req| {
                req.url == "https://api.github.com/user"
                    && req.header("authorization") == Some("token ghp_x")
                    && req.header("accept") == Some("application/vnd.github+json")
                    && req.timeouts.read == Duration::from_secs(30)
                    && req.timeouts.connect == Duration::from_secs(10)
            })
            .returning(|req| Ok(MockResponse::ok(&serde_json::json!({})).into_response(&req.url)));

        let session = session_over(Arc::new(transport));
        session.configure_token_auth("ghp_x");
        let response = session
            .request(Method::GET, "user", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(session.request_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_overrides() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::no_content());
        let session = session_over(transport.clone());

        session
            .request(
                Method::DELETE,
                "/gists/1",
                RequestOptions::new()
                    .timeout(Duration::from_secs(5))
                    .connect_timeout(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].timeouts.read, Duration::from_secs(5));
        assert_eq!(sent[0].timeouts.connect, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_two_factor_retry_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::otp_required());
        transport.push(MockResponse::ok(&serde_json::json!({"login": "octocat"})));
        let session = session_over(transport.clone());
        session.configure_basic_auth("octocat", "pw");
        session.register_two_factor_callback(|| "123456".to_string());

        let response = session
            .request(Method::GET, "/user", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.history().len(), 1);
        assert_eq!(response.history()[0].status(), 401);
        assert_eq!(session.request_count(), 2);

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].header(OTP_HEADER), None);
        assert_eq!(sent[1].header(OTP_HEADER), Some("123456"));
        assert_eq!(sent[1].url, sent[0].url);
    }

    #[tokio::test]
    async fn test_two_factor_retry_is_single_shot() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::otp_required());
        transport.push(MockResponse::otp_required());
        let session = session_over(transport.clone());
        session.register_two_factor_callback(|| "000000".to_string());

        let response = session
            .request(Method::GET, "/user", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert!(response.is_otp_required());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_two_factor_without_callback_returns_original() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::otp_required());
        let session = session_over(transport.clone());

        let response = session
            .request(Method::GET, "/user", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert!(response.history().is_empty());
        assert_eq!(session.request_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_propagated() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(GitHubError::connection("connection refused")));
        let session = session_over(Arc::new(transport));

        let err = session
            .request(Method::GET, "/user", RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), GitHubErrorKind::ConnectionError);
        assert_eq!(session.request_count(), 1);
    }

    #[tokio::test]
    async fn test_per_call_headers_override_defaults() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(MockResponse::ok(&serde_json::json!([])));
        let session = session_over(transport.clone());

        session
            .request(
                Method::GET,
                "/search/code",
                RequestOptions::new().header("Accept", "application/vnd.github.text-match+json"),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.requests()[0].header("accept"),
            Some("application/vnd.github.text-match+json")
        );
    }
}
