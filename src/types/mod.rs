//! Typed domain objects built from API responses.
//!
//! Every object implements [`Model`], the constructor the pagination engine
//! and the client use to turn a raw JSON value into a typed, session-bound
//! value. Objects keep the mapping they were built from so that an unmodified
//! object re-serializes to the same JSON.

mod meta;
mod repos;
mod search;
mod users;

pub use meta::{Emoji, Language, RateLimit, RateLimitResource};
pub use repos::{Owner, Repository, ShortRepository};
pub use search::{RepositorySearchResult, UserSearchResult};
pub use users::{ShortUser, User};

use crate::client::GitHubCore;
use crate::errors::{GitHubError, GitHubResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Reserved key under which the facade injects the `ETag` header.
pub const ETAG_KEY: &str = "ETag";

/// Reserved key under which the facade injects the `Last-Modified` header.
pub const LAST_MODIFIED_KEY: &str = "Last-Modified";

/// Construction of a typed value from API JSON.
pub trait Model: Sized {
    /// Whether an object-shaped page may be consumed as `(key, value)` entries.
    ///
    /// False for domain objects: an object body where a list was expected is
    /// then a malformed response.
    const ACCEPTS_ENTRIES: bool = false;

    /// Builds the value from one JSON element.
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self>;

    /// Builds the value from one entry of an object-shaped page.
    fn from_entry(key: String, value: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let _ = (value, core);
        Err(GitHubError::unprocessable_body(format!(
            "Cannot build this type from the object entry {:?}",
            key
        )))
    }
}

impl Model for Value {
    fn from_json(json: Value, _core: &GitHubCore) -> GitHubResult<Self> {
        Ok(json)
    }
}

impl Model for (String, Value) {
    const ACCEPTS_ENTRIES: bool = true;

    fn from_json(json: Value, _core: &GitHubCore) -> GitHubResult<Self> {
        match json {
            Value::Array(mut pair) if pair.len() == 2 => {
                let value = pair.pop().unwrap_or(Value::Null);
                match pair.pop() {
                    Some(Value::String(key)) => Ok((key, value)),
                    other => Err(GitHubError::unprocessable_body("Expected a string key")
                        .with_body(other.unwrap_or(Value::Null))),
                }
            }
            other => Err(GitHubError::unprocessable_body("Expected a [key, value] pair").with_body(other)),
        }
    }

    fn from_entry(key: String, value: Value, _core: &GitHubCore) -> GitHubResult<Self> {
        Ok((key, value))
    }
}

/// Cache validators carried by an object fetched on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CacheInfo {
    /// `ETag` of the response the object came from.
    pub etag: Option<String>,
    /// `Last-Modified` of the response the object came from.
    pub last_modified: Option<String>,
}

impl CacheInfo {
    /// Removes the reserved cache keys from an object and returns them.
    pub fn take_from(json: &mut Value) -> Self {
        let Some(map) = json.as_object_mut() else {
            return Self::default();
        };
        let take = |map: &mut serde_json::Map<String, Value>, key: &str| match map.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        // Injected keys sit at the end of the map; remove the last one first
        // so the remaining keys keep their order.
        let last_modified = take(map, LAST_MODIFIED_KEY);
        let etag = take(map, ETAG_KEY);
        Self { etag, last_modified }
    }
}

/// Access to the JSON an object was built from.
pub trait JsonBacked {
    /// The mapping the object was built from, cache keys removed.
    fn raw(&self) -> &Value;

    /// Cache validators of the response the object came from.
    fn cache_info(&self) -> &CacheInfo;

    /// Re-serializes the underlying mapping.
    fn as_json(&self) -> String {
        self.raw().to_string()
    }

    /// Gets the `ETag` the object was fetched with.
    fn etag(&self) -> Option<&str> {
        self.cache_info().etag.as_deref()
    }

    /// Gets the `Last-Modified` the object was fetched with.
    fn last_modified(&self) -> Option<&str> {
        self.cache_info().last_modified.as_deref()
    }
}

/// Validates required keys and deserializes the typed fields.
///
/// Returns the fields, the mapping with cache keys stripped, and the cache
/// validators.
pub(crate) fn hydrate<T: DeserializeOwned>(
    mut json: Value,
    resource: &str,
    required: &[&str],
) -> GitHubResult<(T, Value, CacheInfo)> {
    let cache = CacheInfo::take_from(&mut json);
    let Some(map) = json.as_object() else {
        return Err(GitHubError::unprocessable_body(format!(
            "Expected a JSON object for {}",
            resource
        ))
        .with_body(json));
    };
    if let Some(missing) = required.iter().find(|field| !map.contains_key(**field)) {
        return Err(GitHubError::incomplete_response(resource, missing));
    }

    let fields = T::deserialize(&json).map_err(|e| {
        GitHubError::unprocessable_body(format!("Could not decode {}: {}", resource, e)).with_cause(e)
    })?;
    Ok((fields, json, cache))
}
