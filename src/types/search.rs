use super::{CacheInfo, JsonBacked, Model, ShortRepository, ShortUser};
use crate::client::GitHubCore;
use crate::errors::{GitHubError, GitHubResult};
use serde_json::Value;

/// Pulls the search-only keys out of a result and checks `score`.
fn split_result(json: &Value, resource: &str) -> GitHubResult<(f64, Vec<Value>)> {
    let Some(map) = json.as_object() else {
        return Err(GitHubError::unprocessable_body(format!(
            "Expected a JSON object for {}",
            resource
        ))
        .with_body(json.clone()));
    };
    let score = map
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| GitHubError::incomplete_response(resource, "score"))?;
    let text_matches = match map.get("text_matches") {
        Some(Value::Array(matches)) => matches.clone(),
        _ => Vec::new(),
    };
    Ok((score, text_matches))
}

/// A repository search hit.
#[derive(Debug, Clone)]
pub struct RepositorySearchResult {
    /// Relevance score.
    pub score: f64,
    /// The matching repository.
    pub repository: ShortRepository,
    /// Match metadata, present when requested with the text-match media type.
    pub text_matches: Vec<Value>,
}

impl Model for RepositorySearchResult {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (score, text_matches) = split_result(&json, "RepositorySearchResult")?;
        Ok(Self {
            score,
            repository: ShortRepository::from_json(json, core)?,
            text_matches,
        })
    }
}

impl JsonBacked for RepositorySearchResult {
    fn raw(&self) -> &Value {
        self.repository.raw()
    }

    fn cache_info(&self) -> &CacheInfo {
        self.repository.cache_info()
    }
}

/// A user search hit.
#[derive(Debug, Clone)]
pub struct UserSearchResult {
    /// Relevance score.
    pub score: f64,
    /// The matching user.
    pub user: ShortUser,
    /// Match metadata, present when requested with the text-match media type.
    pub text_matches: Vec<Value>,
}

impl Model for UserSearchResult {
    fn from_json(json: Value, core: &GitHubCore) -> GitHubResult<Self> {
        let (score, text_matches) = split_result(&json, "UserSearchResult")?;
        Ok(Self {
            score,
            user: ShortUser::from_json(json, core)?,
            text_matches,
        })
    }
}

impl JsonBacked for UserSearchResult {
    fn raw(&self) -> &Value {
        self.user.raw()
    }

    fn cache_info(&self) -> &CacheInfo {
        self.user.cache_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::errors::GitHubErrorKind;
    use crate::mocks::ScriptedTransport;
    use crate::session::Session;
    use serde_json::json;
    use std::sync::Arc;

    fn core() -> GitHubCore {
        let session =
            Session::with_transport(&GitHubConfig::default(), Arc::new(ScriptedTransport::new())).unwrap();
        GitHubCore::new(Arc::new(session))
    }

    #[test]
    fn test_user_search_result() {
        let hit = json!({
            "login": "mojombo",
            "id": 1,
            "url": "https://api.github.com/users/mojombo",
            "type": "User",
            "score": 1.0
        });
        let result = UserSearchResult::from_json(hit.clone(), &core()).unwrap();
        assert_eq!(result.user.login, "mojombo");
        assert_eq!(result.score, 1.0);
        assert!(result.text_matches.is_empty());
        assert_eq!(result.as_json(), hit.to_string());
    }

    #[test]
    fn test_missing_score_is_incomplete() {
        let hit = json!({"login": "mojombo", "id": 1, "url": "u"});
        let err = UserSearchResult::from_json(hit, &core()).unwrap_err();
        assert_eq!(err.kind(), GitHubErrorKind::IncompleteResponse);
    }

    #[test]
    fn test_repository_search_result_with_text_matches() {
        let hit = json!({
            "id": 3081286,
            "name": "Tetris",
            "full_name": "dtrupenn/Tetris",
            "owner": {"login": "dtrupenn", "id": 872147, "type": "User"},
            "url": "https://api.github.com/repos/dtrupenn/Tetris",
            "score": 1.0,
            "text_matches": [{"fragment": "A C implementation of Tetris"}]
        });
        let result = RepositorySearchResult::from_json(hit, &core()).unwrap();
        assert_eq!(result.repository.full_name, "dtrupenn/Tetris");
        assert_eq!(result.text_matches.len(), 1);
    }
}
