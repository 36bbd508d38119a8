//! HTTP boundary: owned request/response values and the pluggable transport.
//!
//! The session never talks to reqwest directly. It builds an [`HttpRequest`],
//! hands it to a [`Transport`] and gets an [`HttpResponse`] back with the body
//! fully read, which keeps responses cloneable for diagnostics and lets tests
//! script the wire.

use crate::errors::{GitHubError, GitHubResult};
use crate::observability::redact_header;
use crate::pagination::PaginationLinks;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Header carrying the two-factor challenge and the one-time code.
pub const OTP_HEADER: &str = "x-github-otp";

/// Connect and read timeouts applied to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Connection establishment timeout.
    pub connect: Duration,
    /// Response read timeout.
    pub read: Duration,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document.
    Json(Value),
    /// URL-encoded form.
    Form(Vec<(String, String)>),
}

/// A fully assembled request, ready for the transport.
#[derive(Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, possibly already carrying a query string.
    pub url: String,
    /// Headers including authorization.
    pub headers: HeaderMap,
    /// Extra query parameters appended to `url`.
    pub query: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<RequestBody>,
    /// Timeouts for this request.
    pub timeouts: Timeouts,
}

impl HttpRequest {
    /// Gets a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Renders the URL with `query` appended.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let encoded = serde_urlencoded::to_string(&self.query).unwrap_or_default();
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, encoded)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = value.to_str().unwrap_or("<binary>");
                (name.to_string(), redact_header(name.as_str(), value))
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.full_url())
            .field("headers", &headers)
            .field("body", &self.body)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// A response with its body already read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    url: String,
    history: Vec<HttpResponse>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, headers: HeaderMap, body: Bytes, url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body,
            url: url.into(),
            history: Vec::new(),
        }
    }

    /// Gets the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Gets the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Gets the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Gets the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Gets the URL the response came from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Responses superseded by this one, oldest first.
    pub fn history(&self) -> &[HttpResponse] {
        &self.history
    }

    /// Records a superseded response ahead of any existing history.
    pub fn push_history(&mut self, earlier: HttpResponse) {
        self.history.insert(0, earlier);
    }

    /// Parses the `Link` header.
    pub fn links(&self) -> PaginationLinks {
        PaginationLinks::from_headers(&self.headers)
    }

    /// Gets the `ETag` header.
    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    /// Gets the `Last-Modified` header.
    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    /// Gets the GitHub request ID.
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-github-request-id")
    }

    /// Returns true for a two-factor challenge: 401 plus an OTP header
    /// whose value contains `required`.
    pub fn is_otp_required(&self) -> bool {
        self.status == 401
            && self
                .header(OTP_HEADER)
                .map(|v| v.contains("required"))
                .unwrap_or(false)
    }
}

/// Trait for HTTP transport implementations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and reads the full response.
    ///
    /// Network level failures map to `ConnectionError`, anything else the
    /// transport raises maps to `TransportError`. Non-2xx statuses are not
    /// errors at this layer.
    async fn send(&self, request: HttpRequest) -> GitHubResult<HttpResponse>;
}

/// Distinct connect timeouts kept with their own client before the cache is reset.
const CLIENT_CACHE_CAPACITY: usize = 8;

/// Reqwest-based transport.
///
/// reqwest fixes the connect timeout when a client is built, so one client
/// is kept per connect timeout seen and picked per request. The read timeout
/// is applied per request.
#[derive(Debug)]
pub struct ReqwestTransport {
    default_connect_timeout: Duration,
    clients: Mutex<HashMap<Duration, Client>>,
}

impl ReqwestTransport {
    /// Creates a transport with the given default connect timeout.
    pub fn new(connect_timeout: Duration) -> GitHubResult<Self> {
        let client = Self::build_client(connect_timeout)?;
        Ok(Self::from_client(client, connect_timeout))
    }

    /// Wraps an existing reqwest client, used for requests whose connect
    /// timeout is `connect_timeout`.
    pub fn from_client(client: Client, connect_timeout: Duration) -> Self {
        let mut clients = HashMap::new();
        clients.insert(connect_timeout, client);
        Self {
            default_connect_timeout: connect_timeout,
            clients: Mutex::new(clients),
        }
    }

    fn build_client(connect_timeout: Duration) -> GitHubResult<Client> {
        Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                GitHubError::configuration(format!("Failed to create HTTP client: {}", e)).with_cause(e)
            })
    }

    fn client_for(&self, connect_timeout: Duration) -> GitHubResult<Client> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }

        if clients.len() >= CLIENT_CACHE_CAPACITY {
            let default = self.default_connect_timeout;
            clients.retain(|timeout, _| *timeout == default);
        }
        let client = Self::build_client(connect_timeout)?;
        clients.insert(connect_timeout, client.clone());
        Ok(client)
    }

    fn map_error(error: reqwest::Error) -> GitHubError {
        if error.is_connect() || error.is_timeout() {
            GitHubError::connection(format!("Connection failed: {}", error)).with_cause(error)
        } else {
            GitHubError::transport(format!("Request failed: {}", error)).with_cause(error)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> GitHubResult<HttpResponse> {
        let client = self.client_for(request.timeouts.connect)?;
        let mut builder = client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeouts.read);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(pairs)) => builder.form(&pairs),
            None => builder,
        };

        let response = builder.send().await.map_err(Self::map_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await.map_err(Self::map_error)?;

        Ok(HttpResponse::new(status, headers, body, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn request() -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: "https://api.github.com/users?since=10".to_string(),
            headers: HeaderMap::new(),
            query: vec![("per_page".to_string(), "100".to_string())],
            body: None,
            timeouts: Timeouts {
                connect: Duration::from_secs(10),
                read: Duration::from_secs(30),
            },
        }
    }

    #[test]
    fn test_full_url_appends_query() {
        assert_eq!(
            request().full_url(),
            "https://api.github.com/users?since=10&per_page=100"
        );
    }

    #[test]
    fn test_debug_redacts_authorization() {
        let mut req = request();
        req.headers
            .insert("authorization", HeaderValue::from_static("token ghp_secret"));
        let rendered = format!("{:?}", req);
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_otp_challenge_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(OTP_HEADER, HeaderValue::from_static("required; sms"));
        let challenge = HttpResponse::new(401, headers.clone(), Bytes::new(), "u");
        assert!(challenge.is_otp_required());

        let forbidden = HttpResponse::new(403, headers, Bytes::new(), "u");
        assert!(!forbidden.is_otp_required());

        let plain = HttpResponse::new(401, HeaderMap::new(), Bytes::new(), "u");
        assert!(!plain.is_otp_required());
    }

    #[test]
    fn test_client_per_connect_timeout() {
        let transport = ReqwestTransport::new(Duration::from_secs(10)).unwrap();
        transport.client_for(Duration::from_secs(10)).unwrap();
        assert_eq!(transport.clients.lock().len(), 1);

        transport.client_for(Duration::from_millis(250)).unwrap();
        transport.client_for(Duration::from_millis(250)).unwrap();
        assert_eq!(transport.clients.lock().len(), 2);
    }

    #[test]
    fn test_client_cache_keeps_default_when_full() {
        let transport = ReqwestTransport::new(Duration::from_secs(10)).unwrap();
        for millis in 1..=CLIENT_CACHE_CAPACITY as u64 {
            transport.client_for(Duration::from_millis(millis)).unwrap();
        }

        let clients = transport.clients.lock();
        assert!(clients.len() <= CLIENT_CACHE_CAPACITY);
        assert!(clients.contains_key(&Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_per_request_connect_timeout_is_honored() {
        let transport = ReqwestTransport::new(Duration::from_secs(30)).unwrap();
        let mut req = request();
        // non-routable address, so only the connect timeout can end the attempt
        req.url = "http://10.255.255.1/users".to_string();
        req.query.clear();
        req.timeouts = Timeouts {
            connect: Duration::from_millis(200),
            read: Duration::from_secs(30),
        };

        let outcome = tokio::time::timeout(Duration::from_secs(5), transport.send(req)).await;
        let err = outcome.expect("connect override was not applied").unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_history_keeps_oldest_first() {
        let mut latest = HttpResponse::new(200, HeaderMap::new(), Bytes::new(), "u");
        latest.push_history(HttpResponse::new(401, HeaderMap::new(), Bytes::new(), "u"));
        assert_eq!(latest.history().len(), 1);
        assert_eq!(latest.history()[0].status(), 401);
    }
}
