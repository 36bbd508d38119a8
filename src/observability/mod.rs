//! Tracing hooks for session and pagination events.

use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tracing hooks for GitHub API operations.
pub struct TracingHooks;

impl TracingHooks {
    /// Logs the start of an API request.
    pub fn on_request_start(method: &str, url: &str, attempt: u64) {
        debug!(
            method = %method,
            url = %url,
            request_number = attempt,
            "GitHub API request started"
        );
    }

    /// Logs the completion of an API request.
    pub fn on_request_complete(method: &str, url: &str, status: u16, duration: Duration) {
        info!(
            method = %method,
            url = %url,
            status = status,
            duration_ms = duration.as_millis() as u64,
            "GitHub API request completed"
        );
    }

    /// Logs a transport failure.
    pub fn on_request_error(method: &str, url: &str, error: &str) {
        error!(
            method = %method,
            url = %url,
            error = %error,
            "GitHub API request failed"
        );
    }

    /// Logs a two-factor challenge.
    pub fn on_two_factor_challenge(url: &str, will_retry: bool) {
        if will_retry {
            info!(url = %url, "Two-factor code required, retrying with callback code");
        } else {
            warn!(url = %url, "Two-factor code required but no callback is registered");
        }
    }

    /// Logs a status code other than the one the caller expected.
    pub fn on_status_mismatch(url: &str, expected: u16, actual: u16) {
        warn!(
            url = %url,
            expected = expected,
            actual = actual,
            "Unexpected status code, attempting to parse body anyway"
        );
    }

    /// Logs a fetched page.
    pub fn on_page_fetched(url: &str, status: u16, items: usize, has_next: bool) {
        debug!(
            url = %url,
            status = status,
            items = items,
            has_next = has_next,
            "Fetched page"
        );
    }

    /// Logs a traversal that ended because nothing changed.
    pub fn on_not_modified(url: &str) {
        debug!(url = %url, "Collection not modified, ending traversal");
    }
}

/// Sensitive headers that should be redacted in logs.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-github-otp",
    "cookie",
    "set-cookie",
];

/// Redacts sensitive values in headers.
pub fn redact_header(name: &str, value: &str) -> String {
    if SENSITIVE_HEADERS.contains(&name.to_lowercase().as_str()) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_header() {
        assert_eq!(redact_header("Authorization", "token abc"), "[REDACTED]");
        assert_eq!(redact_header("X-GitHub-OTP", "123456"), "[REDACTED]");
        assert_eq!(redact_header("Content-Type", "application/json"), "application/json");
    }
}
