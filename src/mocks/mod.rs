//! Scripted transport for testing code built on the session.
//!
//! [`ScriptedTransport`] answers requests from a queue of canned
//! [`MockResponse`]s in order and records every request it receives.

use crate::errors::{GitHubError, GitHubResult};
use crate::http::{HttpRequest, HttpResponse, Transport, OTP_HEADER};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::collections::VecDeque;

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Headers.
    pub headers: Vec<(String, String)>,
}

impl MockResponse {
    /// Creates a response with the given status and raw body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// Creates a 200 response with a JSON body.
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::new(200, serde_json::to_string(body).unwrap_or_default())
    }

    /// Creates a 201 Created response.
    pub fn created<T: Serialize>(body: &T) -> Self {
        Self::new(201, serde_json::to_string(body).unwrap_or_default())
    }

    /// Creates a 204 No Content response.
    pub fn no_content() -> Self {
        Self::new(204, "")
    }

    /// Creates a 304 Not Modified response.
    pub fn not_modified() -> Self {
        Self::new(304, "")
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(message: &str) -> Self {
        Self::new(
            404,
            serde_json::json!({
                "message": message,
                "documentation_url": "https://docs.github.com/rest"
            })
            .to_string(),
        )
    }

    /// Creates a 401 two-factor challenge.
    pub fn otp_required() -> Self {
        Self::new(
            401,
            serde_json::json!({
                "message": "Must specify two-factor authentication OTP code.",
                "documentation_url": "https://docs.github.com/rest"
            })
            .to_string(),
        )
        .with_header(OTP_HEADER, "required; app")
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds an `ETag` header.
    pub fn with_etag(self, etag: &str) -> Self {
        self.with_header("ETag", etag)
    }

    /// Adds a `Link` header pointing at the next page.
    pub fn with_next(self, url: &str) -> Self {
        self.with_header("Link", format!("<{}>; rel=\"next\"", url))
    }

    /// Converts into a response as if fetched from `url`.
    pub fn into_response(self, url: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        HttpResponse::new(self.status, headers, Bytes::from(self.body), url)
    }
}

/// Transport answering from a queue of canned responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<GitHubResult<MockResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: GitHubError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Gets every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> GitHubResult<HttpResponse> {
        let url = request.full_url();
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Ok(response)) => Ok(response.into_response(&url)),
            Some(Err(error)) => Err(error),
            None => Err(GitHubError::transport(format!(
                "No scripted response left for {}",
                url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Timeouts;
    use reqwest::Method;
    use std::time::Duration;

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: url.to_string(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeouts: Timeouts {
                connect: Duration::from_secs(1),
                read: Duration::from_secs(1),
            },
        }
    }

    #[tokio::test]
    async fn test_responses_are_served_in_order() {
        let transport = ScriptedTransport::new();
        transport.push(MockResponse::ok(&serde_json::json!([1])).with_etag("\"abc\""));
        transport.push(MockResponse::not_modified());

        let first = transport.send(request("https://x/a")).await.unwrap();
        assert_eq!(first.status(), 200);
        assert_eq!(first.etag(), Some("\"abc\""));

        let second = transport.send(request("https://x/b")).await.unwrap();
        assert_eq!(second.status(), 304);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_a_transport_error() {
        let transport = ScriptedTransport::new();
        let err = transport.send(request("https://x/a")).await.unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_next_link_header() {
        let response = MockResponse::ok(&serde_json::json!([]))
            .with_next("https://api.github.com/widgets?page=2")
            .into_response("https://api.github.com/widgets");
        assert_eq!(
            response.links().next.as_deref(),
            Some("https://api.github.com/widgets?page=2")
        );
    }
}
