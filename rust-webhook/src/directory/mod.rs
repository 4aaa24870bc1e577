//! External directory collaborators.
//!
//! The webhook never owns users, organizations, projects or keys. It reads
//! them through two seams:
//! - [`Directory`]: what a user can see under a given scope
//! - [`TokenAuthenticator`]: bearer token → user resolution
//!
//! [`InMemoryDirectory`] implements both from a JSON fixture.

pub mod memory;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{DirectoryFixture, InMemoryDirectory};
pub use models::{
    ApiToken, Organization, OrganizationMember, Project, ProjectKey, Team, User,
};

/// Scope required to link a project by default.
pub const DEFAULT_SCOPE: &str = "project:write";

/// Directory lookup failures.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Token authentication failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown token")]
    UnknownToken,
    #[error("token owner {0} does not exist")]
    UnknownUser(u64),
}

/// Read access to organizations, projects and keys, filtered by visibility.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Organizations in which `user` holds `scope`.
    async fn organizations_for_user(
        &self,
        user: &User,
        scope: &str,
    ) -> Result<Vec<Organization>, DirectoryError>;

    /// Projects of `organization` owned by teams `user` can act on with `scope`.
    async fn projects_for_user(
        &self,
        organization: &Organization,
        user: &User,
        scope: &str,
    ) -> Result<Vec<Project>, DirectoryError>;

    /// Client keys of `project`.
    async fn keys_for_project(&self, project: &Project) -> Result<Vec<ProjectKey>, DirectoryError>;
}

/// Resolves bearer tokens into an authenticated user.
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<(User, ApiToken), AuthError>;
}
