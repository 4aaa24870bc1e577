//! Web server module for the Cloudflare app-install webhook.
//!
//! This module provides a single signed endpoint that:
//! - Verifies the HMAC signature of the raw body
//! - Identifies the caller
//! - Advances the configuration wizard and returns the updated install

pub mod caller;
pub mod error;
pub mod handlers;
pub mod payload;
pub mod signature;
pub mod wizard;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use caller::{authenticate, CallerContext};
pub use error::WebhookError;
pub use handlers::{cloudflare_webhook, health, AppState, HealthResponse};
pub use payload::{FieldSpec, Install, InstallPayload, WizardResponse};
pub use signature::{select_secret, sign, verify, KeyVariant};
pub use wizard::{resolve_organization, resolve_project, Wizard, WizardEvent};

/// Path Cloudflare posts install callbacks to.
pub const WEBHOOK_PATH: &str = "/extensions/cloudflare/webhook/";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(cloudflare_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
