//! In-memory directory backed by a JSON fixture.
//!
//! Results are returned in ascending id order so the wizard's "first entry"
//! default is stable.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::info;

use super::models::{
    ApiToken, Organization, OrganizationMember, Project, ProjectKey, Team, User,
};
use super::{AuthError, Directory, DirectoryError, TokenAuthenticator};

/// Serialized form of the directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFixture {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub members: Vec<OrganizationMember>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub keys: Vec<ProjectKey>,
}

/// Directory and token authenticator held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    data: DirectoryFixture,
}

impl InMemoryDirectory {
    pub fn new(mut data: DirectoryFixture) -> Self {
        data.organizations.sort_by_key(|o| o.id);
        data.projects.sort_by_key(|p| p.id);
        data.keys.sort_by_key(|k| k.id);
        Self { data }
    }

    /// Load a fixture file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directory fixture {}", path.display()))?;
        let data: DirectoryFixture =
            serde_json::from_str(&raw).context("Failed to parse directory fixture")?;

        info!(
            users = data.users.len(),
            organizations = data.organizations.len(),
            projects = data.projects.len(),
            keys = data.keys.len(),
            "directory_fixture_loaded"
        );

        Ok(Self::new(data))
    }

    fn has_scope(&self, organization_id: u64, user_id: u64, scope: &str) -> bool {
        self.data.members.iter().any(|m| {
            m.organization_id == organization_id
                && m.user_id == user_id
                && m.scopes.iter().any(|s| s == scope)
        })
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn organizations_for_user(
        &self,
        user: &User,
        scope: &str,
    ) -> Result<Vec<Organization>, DirectoryError> {
        Ok(self
            .data
            .organizations
            .iter()
            .filter(|o| self.has_scope(o.id, user.id, scope))
            .cloned()
            .collect())
    }

    async fn projects_for_user(
        &self,
        organization: &Organization,
        user: &User,
        scope: &str,
    ) -> Result<Vec<Project>, DirectoryError> {
        if !self.has_scope(organization.id, user.id, scope) {
            return Ok(Vec::new());
        }

        let team_ids: Vec<u64> = self
            .data
            .teams
            .iter()
            .filter(|t| t.organization_id == organization.id && t.member_ids.contains(&user.id))
            .map(|t| t.id)
            .collect();

        Ok(self
            .data
            .projects
            .iter()
            .filter(|p| p.organization_id == organization.id && team_ids.contains(&p.team_id))
            .cloned()
            .collect())
    }

    async fn keys_for_project(&self, project: &Project) -> Result<Vec<ProjectKey>, DirectoryError> {
        Ok(self
            .data
            .keys
            .iter()
            .filter(|k| k.project_id == project.id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TokenAuthenticator for InMemoryDirectory {
    async fn authenticate(&self, token: &str) -> Result<(User, ApiToken), AuthError> {
        let api_token = self
            .data
            .tokens
            .iter()
            .find(|t| bool::from(t.token.as_bytes().ct_eq(token.as_bytes())))
            .ok_or(AuthError::UnknownToken)?;

        let user = self
            .data
            .users
            .iter()
            .find(|u| u.id == api_token.user_id)
            .ok_or(AuthError::UnknownUser(api_token.user_id))?;

        Ok((user.clone(), api_token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> InMemoryDirectory {
        let data: DirectoryFixture = serde_json::from_value(serde_json::json!({
            "users": [{"id": 1, "username": "alice"}, {"id": 2, "username": "bob"}],
            "tokens": [
                {"id": 10, "user_id": 1, "token": "alice-token"},
                {"id": 11, "user_id": 99, "token": "orphan-token"}
            ],
            "organizations": [{"id": 200, "slug": "beta"}, {"id": 100, "slug": "acme"}],
            "members": [
                {"organization_id": 100, "user_id": 1, "scopes": ["project:read", "project:write"]},
                {"organization_id": 200, "user_id": 1, "scopes": ["project:write"]},
                {"organization_id": 100, "user_id": 2, "scopes": ["project:read"]}
            ],
            "teams": [
                {"id": 1000, "organization_id": 100, "slug": "core", "member_ids": [1, 2]},
                {"id": 1001, "organization_id": 100, "slug": "ops", "member_ids": [2]}
            ],
            "projects": [
                {"id": 5001, "organization_id": 100, "team_id": 1001, "slug": "infra"},
                {"id": 5000, "organization_id": 100, "team_id": 1000, "slug": "web"}
            ],
            "keys": [
                {"id": 1, "project_id": 5000, "public_key": "pub", "secret_key": "sec"}
            ]
        }))
        .unwrap();
        InMemoryDirectory::new(data)
    }

    fn user(id: u64) -> User {
        User { id, username: String::new() }
    }

    #[tokio::test]
    async fn test_organizations_sorted_and_scoped() {
        let dir = fixture();

        let orgs = dir.organizations_for_user(&user(1), "project:write").await.unwrap();
        let ids: Vec<u64> = orgs.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![100, 200]);

        let orgs = dir.organizations_for_user(&user(2), "project:write").await.unwrap();
        assert!(orgs.is_empty());
    }

    #[tokio::test]
    async fn test_projects_filtered_by_team_membership() {
        let dir = fixture();
        let org = Organization { id: 100, slug: "acme".to_string() };

        let projects = dir.projects_for_user(&org, &user(1), "project:write").await.unwrap();
        let slugs: Vec<&str> = projects.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["web"]);

        // Bob is on both teams but lacks the write scope.
        let projects = dir.projects_for_user(&org, &user(2), "project:write").await.unwrap();
        assert!(projects.is_empty());

        let projects = dir.projects_for_user(&org, &user(2), "project:read").await.unwrap();
        assert_eq!(projects.len(), 2);
    }

    #[tokio::test]
    async fn test_keys_for_project() {
        let dir = fixture();
        let project = Project {
            id: 5000,
            organization_id: 100,
            team_id: 1000,
            slug: "web".to_string(),
        };
        let keys = dir.keys_for_project(&project).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].public_key, "pub");
    }

    #[tokio::test]
    async fn test_authenticate_token() {
        let dir = fixture();

        let (user, token) = dir.authenticate("alice-token").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(token.id, 10);

        assert_eq!(dir.authenticate("nope").await.unwrap_err(), AuthError::UnknownToken);
        assert_eq!(
            dir.authenticate("orphan-token").await.unwrap_err(),
            AuthError::UnknownUser(99)
        );
    }

    #[tokio::test]
    async fn test_example_fixture_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/directory.example.json");
        let dir = InMemoryDirectory::from_path(path).unwrap();

        let (user, _) = dir.authenticate("local-dev-token").await.unwrap();
        let orgs = dir.organizations_for_user(&user, "project:write").await.unwrap();
        assert_eq!(orgs.len(), 1);
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(InMemoryDirectory::from_path("/nonexistent/directory.json").is_err());
    }
}
