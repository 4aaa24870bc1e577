//! Directory entities referenced by the configuration wizard.
//!
//! These are owned by the external user/organization/project directory;
//! the webhook only ever reads them.

use serde::{Deserialize, Serialize};
use url::Url;

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

/// An API token issued to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: u64,
    pub user_id: u64,
    /// Secret bearer value
    pub token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// An organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub slug: String,
}

/// A user's membership in an organization and the scopes it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub organization_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// A team inside an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub organization_id: u64,
    pub slug: String,
    /// Users belonging to the team
    #[serde(default)]
    pub member_ids: Vec<u64>,
}

/// A project owned by a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub organization_id: u64,
    pub team_id: u64,
    pub slug: String,
}

/// A client key of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectKey {
    pub id: u64,
    pub project_id: u64,
    pub public_key: String,
    pub secret_key: String,
}

impl ProjectKey {
    /// Build the public DSN for this key.
    ///
    /// The DSN is `base_url` with the public key as the username and the
    /// project id appended to the path, e.g.
    /// `https://abc123@sentry.io/42`. The secret key is never included.
    pub fn public_dsn(&self, base_url: &Url) -> String {
        let mut dsn = base_url.clone();
        // Only fails for cannot-be-a-base URLs, which config rejects.
        let _ = dsn.set_username(&self.public_key);
        let _ = dsn.set_password(None);
        dsn.set_query(None);
        dsn.set_fragment(None);

        let base_path = dsn.path().trim_end_matches('/').to_string();
        dsn.set_path(&format!("{}/{}", base_path, self.project_id));

        dsn.to_string()
    }
}
