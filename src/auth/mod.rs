//! Authentication strategies for the GitHub API.
//!
//! A [`Credential`] turns itself into an `Authorization` header value. The two
//! GitHub App variants carry a validity window and refuse to authorize once it
//! has passed, so an expired token never reaches the wire.

use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest lifetime GitHub accepts for an App JWT, in seconds.
pub const APP_JWT_MAX_TTL: i64 = 600;

/// Credential attached to every request issued by a session.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Username and password sent as HTTP Basic.
    Basic {
        /// Login name.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// Personal access or OAuth token, sent as `token <value>`.
    Token(SecretString),
    /// GitHub App JWT, sent as `Bearer <value>` until `issued_at + ttl`.
    AppBearer {
        /// Signed JWT.
        token: SecretString,
        /// When the token was configured.
        issued_at: DateTime<Utc>,
        /// Validity window.
        ttl: Duration,
    },
    /// GitHub App installation token, sent as `token <value>` until `expires_at`.
    AppInstallation {
        /// Installation access token.
        token: SecretString,
        /// Absolute expiry returned by the API.
        expires_at: DateTime<Utc>,
    },
}

/// The variant of a [`Credential`], without its secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// HTTP Basic.
    Basic,
    /// Static token.
    Token,
    /// GitHub App bearer JWT.
    AppBearer,
    /// GitHub App installation token.
    AppInstallation,
}

impl Credential {
    /// Creates a basic credential.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Creates a static token credential.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::new(token.into()))
    }

    /// Creates an app bearer credential valid for `ttl` from now.
    pub fn app_bearer(token: impl Into<String>, ttl: Duration) -> Self {
        Self::AppBearer {
            token: SecretString::new(token.into()),
            issued_at: Utc::now(),
            ttl,
        }
    }

    /// Creates an app installation credential valid until `expires_at`.
    pub fn app_installation(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self::AppInstallation {
            token: SecretString::new(token.into()),
            expires_at,
        }
    }

    /// Gets the credential kind.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Basic { .. } => CredentialKind::Basic,
            Self::Token(_) => CredentialKind::Token,
            Self::AppBearer { .. } => CredentialKind::AppBearer,
            Self::AppInstallation { .. } => CredentialKind::AppInstallation,
        }
    }

    /// Returns true once the validity window has passed.
    ///
    /// Basic and static token credentials never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Basic { .. } | Self::Token(_) => false,
            // a window past the representable range never closes
            Self::AppBearer { issued_at, ttl, .. } => issued_at
                .checked_add_signed(*ttl)
                .map_or(false, |expires_at| now > expires_at),
            Self::AppInstallation { expires_at, .. } => now > *expires_at,
        }
    }

    /// Produces the `Authorization` header value.
    pub fn authorization(&self) -> GitHubResult<String> {
        self.authorization_at(Utc::now())
    }

    /// Produces the `Authorization` header value against an explicit clock reading.
    pub fn authorization_at(&self, now: DateTime<Utc>) -> GitHubResult<String> {
        match self {
            Self::Basic { username, password } => {
                let pair = format!("{}:{}", username, password.expose_secret());
                Ok(format!("Basic {}", STANDARD.encode(pair)))
            }
            Self::Token(token) => Ok(format!("token {}", token.expose_secret())),
            Self::AppBearer { token, .. } => {
                if self.is_expired_at(now) {
                    return Err(GitHubError::new(
                        GitHubErrorKind::AppTokenExpired,
                        "Your app token has expired",
                    ));
                }
                Ok(format!("Bearer {}", token.expose_secret()))
            }
            Self::AppInstallation { token, .. } => {
                if self.is_expired_at(now) {
                    return Err(GitHubError::new(
                        GitHubErrorKind::AppInstallationTokenExpired,
                        "Your app installation token has expired",
                    ));
                }
                Ok(format!("token {}", token.expose_secret()))
            }
        }
    }
}

/// JWT claims for GitHub App authentication.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppJwtClaims {
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issuer (App ID).
    pub iss: String,
}

/// Signs a GitHub App JWT.
///
/// `iat` is backdated 60 seconds for clock drift and `expire_in` is capped at
/// [`APP_JWT_MAX_TTL`]. Returns the token with its effective lifetime.
pub fn create_app_jwt(
    private_key_pem: &[u8],
    app_id: u64,
    expire_in: i64,
) -> GitHubResult<(String, Duration)> {
    let expire_in = expire_in.clamp(1, APP_JWT_MAX_TTL);
    let now = Utc::now();
    let claims = AppJwtClaims {
        iat: (now - Duration::seconds(60)).timestamp(),
        exp: (now + Duration::seconds(expire_in)).timestamp(),
        iss: app_id.to_string(),
    };

    let key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| {
        GitHubError::new(
            GitHubErrorKind::InvalidAppCredentials,
            format!("Failed to parse private key: {}", e),
        )
        .with_cause(e)
    })?;

    let token = encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
        GitHubError::new(
            GitHubErrorKind::InvalidAppCredentials,
            format!("Failed to generate JWT: {}", e),
        )
        .with_cause(e)
    })?;

    Ok((token, Duration::seconds(expire_in)))
}

/// Installation token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationToken {
    /// Access token.
    pub token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    /// Permissions granted.
    #[serde(default)]
    pub permissions: HashMap<String, String>,
    /// Repository selection.
    pub repository_selection: Option<String>,
}

impl InstallationToken {
    /// Converts the response into an installation credential.
    pub fn into_credential(self) -> Credential {
        Credential::app_installation(self.token, self.expires_at)
    }
}
