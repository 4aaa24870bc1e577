//! Configuration wizard steps.
//!
//! The wizard walks account → organization → project → DSN. Each step writes
//! a schema fragment for its option and, when that fragment has at least one
//! choice, selects the first and runs the next step in the same request.
//! An empty fragment halts the wizard with `proceed: true`.
//!
//! Lookup misses and directory failures are treated as "nothing visible".

use std::collections::BTreeMap;

use tracing::{info, warn};
use url::Url;

use crate::directory::{Directory, Organization, Project, ProjectKey, DEFAULT_SCOPE};
use crate::web::caller::CallerContext;
use crate::web::error::WebhookError;
use crate::web::payload::{FieldSpec, Install, WizardResponse};
use crate::web::signature::KeyVariant;

pub const ORGANIZATION_OPTION: &str = "organization";
pub const PROJECT_OPTION: &str = "project";
pub const DSN_OPTION: &str = "dsn";

const DSN_DESCRIPTION: &str = "Your automatically configured DSN for communicating with Sentry.";
const DSN_PLACEHOLDER: &str = "https://public_key@sentry.io/1";

/// Webhook events the wizard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Preview,
    AccountChange,
    OrganizationChange,
    ProjectChange,
    Unrecognized,
}

impl WizardEvent {
    pub fn from_event(event: Option<&str>) -> Self {
        match event {
            Some("preview") => Self::Preview,
            Some("option-change:account") => Self::AccountChange,
            Some("option-change:organization") => Self::OrganizationChange,
            Some("option-change:project") => Self::ProjectChange,
            _ => Self::Unrecognized,
        }
    }
}

/// Per-request collaborators for the wizard.
pub struct Wizard<'a> {
    pub directory: &'a dyn Directory,
    pub dsn_base_url: &'a Url,
    pub variant: KeyVariant,
}

impl<'a> Wizard<'a> {
    pub fn new(directory: &'a dyn Directory, dsn_base_url: &'a Url, variant: KeyVariant) -> Self {
        Self {
            directory,
            dsn_base_url,
            variant,
        }
    }

    /// Run the step for `event`.
    pub async fn dispatch(
        &self,
        event: WizardEvent,
        caller: &CallerContext,
        install: Install,
    ) -> Result<WizardResponse, WebhookError> {
        match event {
            WizardEvent::Preview => self.on_preview(caller, install).await,
            WizardEvent::AccountChange => self.on_account_change(caller, install).await,
            WizardEvent::OrganizationChange => self.on_organization_change(caller, install).await,
            WizardEvent::ProjectChange => self.on_project_change(caller, install).await,
            WizardEvent::Unrecognized => Ok(WizardResponse::proceed(install)),
        }
    }

    /// Anonymous previews are handed back for interactive login.
    pub async fn on_preview(
        &self,
        caller: &CallerContext,
        install: Install,
    ) -> Result<WizardResponse, WebhookError> {
        if !caller.is_authenticated() {
            info!(is_test = self.variant.is_test(), "cloudflare_wizard_preview_anonymous");
            return Ok(WizardResponse::proceed(install));
        }

        self.on_account_change(caller, install).await
    }

    pub async fn on_account_change(
        &self,
        caller: &CallerContext,
        mut install: Install,
    ) -> Result<WizardResponse, WebhookError> {
        let user = caller.require_user()?;

        let organizations = match self
            .directory
            .organizations_for_user(user, DEFAULT_SCOPE)
            .await
        {
            Ok(orgs) => orgs,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "cloudflare_wizard_organizations_failed");
                Vec::new()
            }
        };

        let field = organization_field(&organizations);
        let first = field.first_choice().map(str::to_string);
        install.set_field(ORGANIZATION_OPTION, field);

        info!(
            user_id = user.id,
            organizations = organizations.len(),
            is_test = self.variant.is_test(),
            "cloudflare_wizard_account_step"
        );

        match first {
            Some(id) => {
                install.select(ORGANIZATION_OPTION, id);
                self.on_organization_change(caller, install).await
            }
            None => Ok(WizardResponse::proceed(install)),
        }
    }

    pub async fn on_organization_change(
        &self,
        caller: &CallerContext,
        mut install: Install,
    ) -> Result<WizardResponse, WebhookError> {
        let user = caller.require_user()?;

        let organization =
            resolve_organization(self.directory, caller, &install, DEFAULT_SCOPE).await;
        let projects = match organization {
            Some(org) => match self.directory.projects_for_user(&org, user, DEFAULT_SCOPE).await {
                Ok(projects) => projects,
                Err(e) => {
                    warn!(
                        user_id = user.id,
                        organization_id = org.id,
                        error = %e,
                        "cloudflare_wizard_projects_failed"
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let field = project_field(&projects);
        let first = field.first_choice().map(str::to_string);
        install.set_field(PROJECT_OPTION, field);

        info!(
            user_id = user.id,
            projects = projects.len(),
            "cloudflare_wizard_organization_step"
        );

        match first {
            Some(id) => {
                install.select(PROJECT_OPTION, id);
                self.on_project_change(caller, install).await
            }
            None => Ok(WizardResponse::proceed(install)),
        }
    }

    /// Final step: always halts.
    pub async fn on_project_change(
        &self,
        caller: &CallerContext,
        mut install: Install,
    ) -> Result<WizardResponse, WebhookError> {
        let user = caller.require_user()?;

        let keys = match resolve_project(self.directory, caller, &install, DEFAULT_SCOPE).await {
            Some(project) => match self.directory.keys_for_project(&project).await {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(project_id = project.id, error = %e, "cloudflare_wizard_keys_failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let field = dsn_field(&keys, self.dsn_base_url);
        let first = field.first_choice().map(str::to_string);
        install.set_field(DSN_OPTION, field);

        if let Some(dsn) = first {
            install.select(DSN_OPTION, dsn);
        }

        info!(user_id = user.id, keys = keys.len(), "cloudflare_wizard_project_step");

        Ok(WizardResponse::proceed(install))
    }
}

/// Find the organization selected in `install` among those the caller can see.
pub async fn resolve_organization(
    directory: &dyn Directory,
    caller: &CallerContext,
    install: &Install,
    scope: &str,
) -> Option<Organization> {
    let wanted = install.option(ORGANIZATION_OPTION)?;
    let user = caller.user()?;

    let organizations = match directory.organizations_for_user(user, scope).await {
        Ok(orgs) => orgs,
        Err(e) => {
            warn!(user_id = user.id, error = %e, "cloudflare_resolve_organization_failed");
            return None;
        }
    };

    organizations.into_iter().find(|o| o.id.to_string() == wanted)
}

/// Find the project selected in `install` within the selected organization.
pub async fn resolve_project(
    directory: &dyn Directory,
    caller: &CallerContext,
    install: &Install,
    scope: &str,
) -> Option<Project> {
    let wanted = install.option(PROJECT_OPTION)?;
    let user = caller.user()?;
    let organization = resolve_organization(directory, caller, install, scope).await?;

    let projects = match directory.projects_for_user(&organization, user, scope).await {
        Ok(projects) => projects,
        Err(e) => {
            warn!(user_id = user.id, error = %e, "cloudflare_resolve_project_failed");
            return None;
        }
    };

    projects.into_iter().find(|p| p.id.to_string() == wanted)
}

fn organization_field(organizations: &[Organization]) -> FieldSpec {
    let mut field = FieldSpec::select(
        "Sentry Organization",
        1,
        organizations.iter().map(|o| o.id.to_string()).collect(),
    );
    field.choice_names = Some(
        organizations
            .iter()
            .map(|o| (o.id.to_string(), o.slug.clone()))
            .collect::<BTreeMap<_, _>>(),
    );
    field
}

fn project_field(projects: &[Project]) -> FieldSpec {
    let mut field = FieldSpec::select(
        "Sentry Project",
        2,
        projects.iter().map(|p| p.id.to_string()).collect(),
    );
    field.choice_names = Some(
        projects
            .iter()
            .map(|p| (p.id.to_string(), p.slug.clone()))
            .collect::<BTreeMap<_, _>>(),
    );
    field
}

fn dsn_field(keys: &[ProjectKey], base_url: &Url) -> FieldSpec {
    let mut field = FieldSpec::select(
        "DSN",
        3,
        keys.iter().map(|k| k.public_dsn(base_url)).collect(),
    );
    field.description = Some(DSN_DESCRIPTION.to_string());
    field.placeholder = Some(DSN_PLACEHOLDER.to_string());
    field
}
