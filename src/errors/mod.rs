//! Error types for the GitHub client.

use crate::http::HttpResponse;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias for GitHub operations.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Error kinds for categorizing GitHub errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitHubErrorKind {
    // Transport errors
    /// Connection refused, DNS failure or timeout.
    ConnectionError,
    /// Any other failure raised by the HTTP transport.
    TransportError,

    // Response status errors
    /// 400 Bad Request.
    BadRequest,
    /// 401 Unauthorized.
    AuthenticationFailed,
    /// 403 Forbidden.
    Forbidden,
    /// 404 Not Found.
    NotFound,
    /// 405 Method Not Allowed.
    MethodNotAllowed,
    /// 406 Not Acceptable.
    NotAcceptable,
    /// 409 Conflict.
    Conflict,
    /// 422 Unprocessable Entity.
    UnprocessableEntity,
    /// 451 Unavailable For Legal Reasons.
    UnavailableForLegalReasons,
    /// Any other 4xx status.
    ClientError,
    /// Any 5xx status.
    ServerError,

    // Response body errors
    /// Body expected to be JSON could not be parsed.
    UnexpectedResponse,
    /// Body was JSON but not of the required shape.
    UnprocessableResponseBody,
    /// A model required a field the server did not return.
    IncompleteResponse,

    // Credential expiry
    /// The GitHub App bearer token (JWT) has expired.
    AppTokenExpired,
    /// The GitHub App installation token has expired.
    AppInstallationTokenExpired,

    // Missing authentication
    /// The operation requires some form of authentication.
    AuthenticationRequired,
    /// The operation requires username/password authentication.
    BasicAuthRequired,
    /// The operation requires GitHub App bearer authentication.
    AppBearerAuthRequired,
    /// The operation requires GitHub App installation authentication.
    AppInstallationAuthRequired,

    // Local errors
    /// Invalid configuration.
    InvalidConfiguration,
    /// Invalid GitHub App credentials (private key, app id).
    InvalidAppCredentials,
    /// A request could not be assembled (bad header value, body encoding).
    InvalidRequest,
}

impl GitHubErrorKind {
    /// Maps an HTTP status code to its error kind.
    ///
    /// Returns `None` for statuses below 400.
    pub fn from_status(status: u16) -> Option<Self> {
        let kind = match status {
            400 => Self::BadRequest,
            401 => Self::AuthenticationFailed,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            406 => Self::NotAcceptable,
            409 => Self::Conflict,
            422 => Self::UnprocessableEntity,
            451 => Self::UnavailableForLegalReasons,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns true for kinds raised from a `>= 400` response status.
    pub fn is_response_status(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::AuthenticationFailed
                | Self::Forbidden
                | Self::NotFound
                | Self::MethodNotAllowed
                | Self::NotAcceptable
                | Self::Conflict
                | Self::UnprocessableEntity
                | Self::UnavailableForLegalReasons
                | Self::ClientError
                | Self::ServerError
        )
    }

    /// Returns true for credential expiry kinds.
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, Self::AppTokenExpired | Self::AppInstallationTokenExpired)
    }

    /// Returns true for missing-authentication kinds.
    pub fn is_missing_authentication(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired
                | Self::BasicAuthRequired
                | Self::AppBearerAuthRequired
                | Self::AppInstallationAuthRequired
        )
    }
}

impl fmt::Display for GitHubErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionError => "connection_error",
            Self::TransportError => "transport_error",
            Self::BadRequest => "bad_request",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::NotAcceptable => "not_acceptable",
            Self::Conflict => "conflict",
            Self::UnprocessableEntity => "unprocessable_entity",
            Self::UnavailableForLegalReasons => "unavailable_for_legal_reasons",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::UnexpectedResponse => "unexpected_response",
            Self::UnprocessableResponseBody => "unprocessable_response_body",
            Self::IncompleteResponse => "incomplete_response",
            Self::AppTokenExpired => "app_token_expired",
            Self::AppInstallationTokenExpired => "app_installation_token_expired",
            Self::AuthenticationRequired => "authentication_required",
            Self::BasicAuthRequired => "basic_auth_required",
            Self::AppBearerAuthRequired => "app_bearer_auth_required",
            Self::AppInstallationAuthRequired => "app_installation_auth_required",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::InvalidAppCredentials => "invalid_app_credentials",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(name)
    }
}

/// Error body format returned by the GitHub API.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    documentation_url: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

/// GitHub API error with detailed information.
#[derive(Error, Debug)]
pub struct GitHubError {
    /// Error kind.
    kind: GitHubErrorKind,
    /// Error message.
    message: String,
    /// HTTP status code.
    status_code: Option<u16>,
    /// Structured error list from the response body.
    errors: Vec<Value>,
    /// The offending body for shape errors.
    body: Option<Value>,
    /// GitHub request ID.
    request_id: Option<String>,
    /// Documentation URL.
    documentation_url: Option<String>,
    /// Underlying cause.
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for GitHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        if let Some(ref id) = self.request_id {
            write!(f, " [request_id: {}]", id)?;
        }
        Ok(())
    }
}

impl GitHubError {
    /// Creates a new GitHub error.
    pub fn new(kind: GitHubErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            errors: Vec::new(),
            body: None,
            request_id: None,
            documentation_url: None,
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the structured error list.
    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = errors;
        self
    }

    /// Attaches the body that could not be handled.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the GitHub request ID.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Sets the documentation URL.
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> GitHubErrorKind {
        self.kind
    }

    /// Gets the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Gets the structured error list from the response body.
    pub fn errors(&self) -> &[Value] {
        &self.errors
    }

    /// Gets the body that could not be handled, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Gets the request ID.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Gets the documentation URL.
    pub fn documentation_url(&self) -> Option<&str> {
        self.documentation_url.as_deref()
    }

    /// Returns true if this error was raised from a `>= 400` status.
    pub fn is_response_status_error(&self) -> bool {
        self.kind.is_response_status()
    }

    /// Returns true if a credential expired before the request was sent.
    pub fn is_credential_expired(&self) -> bool {
        self.kind.is_credential_expired()
    }

    /// Returns true if an operation was gated on missing authentication.
    pub fn is_missing_authentication(&self) -> bool {
        self.kind.is_missing_authentication()
    }

    /// Returns true for transport level failures.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self.kind,
            GitHubErrorKind::ConnectionError | GitHubErrorKind::TransportError
        )
    }

    /// Creates the status-mapped error for a response.
    ///
    /// The message and structured errors come from the JSON body when it has
    /// the usual `{"message": ..., "errors": [...]}` shape, otherwise the raw
    /// body text is used.
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = response.status();
        let kind = GitHubErrorKind::from_status(status).unwrap_or(GitHubErrorKind::ClientError);
        let parsed = serde_json::from_slice::<ErrorBody>(response.body()).ok();

        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .or_else(|| {
                let text = response.text();
                (!text.trim().is_empty()).then(|| text.into_owned())
            })
            .unwrap_or_else(|| format!("HTTP {} error", status));

        let mut error = Self::new(kind, message).with_status(status);
        if let Some(body) = parsed {
            error.errors = body.errors;
            error.documentation_url = body.documentation_url;
        }
        if let Some(id) = response.request_id() {
            error = error.with_request_id(id);
        }
        error
    }

    // Convenience constructors

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::ConnectionError, message)
    }

    /// Creates a generic transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::TransportError, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::InvalidConfiguration, message)
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::InvalidRequest, message)
    }

    /// Creates an error for a body that is not valid JSON.
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::UnexpectedResponse, message)
    }

    /// Creates an error for a JSON body of the wrong shape.
    pub fn unprocessable_body(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::UnprocessableResponseBody, message)
    }

    /// Creates an error for a model missing a required field.
    pub fn incomplete_response(resource: &str, field: &str) -> Self {
        Self::new(
            GitHubErrorKind::IncompleteResponse,
            format!("The API returned a {} without the required \"{}\" field", resource, field),
        )
    }
}
