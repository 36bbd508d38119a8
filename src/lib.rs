//! # GitHub REST Client Core
//!
//! An async client core for GitHub's v3 REST API with:
//! - Lazy, restartable pagination over `Link` headers with item budgets
//! - Conditional re-traversal with first-page `ETag`s
//! - Search pagination that tracks `total_count`
//! - Basic, token, GitHub App JWT and installation token authentication
//! - Transparent two-factor retry and scoped credential swaps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_github_rest::GitHubClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GitHubClient::builder().token("ghp_xxxxxxxxxxxx").build()?;
//!
//!     // Walk every public repository of a user, 100 per page
//!     let mut repos = client.repositories().list_for_user("octocat", None, -1);
//!     while let Some(repo) = repos.try_next().await? {
//!         println!("{}", repo.full_name);
//!     }
//!
//!     // Later: re-walk only if something changed
//!     repos.refresh(true);
//!     if repos.try_next().await?.is_none() && repos.last_status() == Some(304) {
//!         println!("unchanged");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Authentication
pub mod auth;

// HTTP boundary and session
pub mod http;
pub mod session;

// Request facade and client
pub mod client;

// Pagination handling
pub mod pagination;

// API Services
pub mod services;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use auth::{Credential, CredentialKind, InstallationToken};
pub use client::{GitHubClient, GitHubClientBuilder, GitHubCore};
pub use config::{GitHubConfig, GitHubConfigBuilder};
pub use errors::{GitHubError, GitHubErrorKind, GitHubResult};
pub use http::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use pagination::{GitHubIterator, PaginationLinks, SearchIterator};
pub use session::{AuthGuard, RequestOptions, Session};
pub use types::*;
