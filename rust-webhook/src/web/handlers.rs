//! Webhook endpoint handlers.
//!
//! The Cloudflare handler:
//! 1. Parses the JSON body
//! 2. Establishes the caller (header token, then embedded token)
//! 3. Checks the signature headers and selects the shared secret
//! 4. Verifies the signature over the raw body
//! 5. Runs the wizard step named by `event`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::directory::{Directory, InMemoryDirectory, TokenAuthenticator};
use crate::web::caller;
use crate::web::error::WebhookError;
use crate::web::payload::{InstallPayload, WizardResponse};
use crate::web::signature::{select_secret, verify, SIGNATURE_HEADER, VARIANT_HEADER};
use crate::web::wizard::{Wizard, WizardEvent};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<dyn Directory>,
    pub tokens: Arc<dyn TokenAuthenticator>,
}

impl AppState {
    pub fn new(
        config: Config,
        directory: Arc<dyn Directory>,
        tokens: Arc<dyn TokenAuthenticator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            directory,
            tokens,
        }
    }

    /// State where one in-memory directory serves both lookups and tokens.
    pub fn in_memory(config: Config, directory: InMemoryDirectory) -> Self {
        let directory = Arc::new(directory);
        Self::new(config, directory.clone(), directory)
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Cloudflare Webhook
// =============================================================================

/// Fields attached to every webhook log line.
struct RequestLog {
    user_id: Option<u64>,
    signature: Option<String>,
    variant: Option<String>,
}

impl RequestLog {
    fn reject(&self, err: WebhookError) -> WebhookError {
        if err == WebhookError::Unauthenticated {
            warn!(
                tag = err.tag(),
                user_id = self.user_id,
                signature = self.signature.as_deref(),
                variant = self.variant.as_deref(),
                "cloudflare_webhook_rejected"
            );
        } else {
            error!(
                tag = err.tag(),
                user_id = self.user_id,
                signature = self.signature.as_deref(),
                variant = self.variant.as_deref(),
                "cloudflare_webhook_rejected"
            );
        }
        err
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Cloudflare app-install webhook endpoint.
pub async fn cloudflare_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle_webhook(&state, &headers, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WizardResponse, WebhookError> {
    let session = caller::authenticate_header(headers, state.tokens.as_ref()).await;
    let mut log = RequestLog {
        user_id: session.user_id(),
        signature: header_value(headers, SIGNATURE_HEADER),
        variant: header_value(headers, VARIANT_HEADER),
    };

    let payload: InstallPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "cloudflare_webhook_parse_failed");
            return Err(log.reject(WebhookError::MalformedPayload));
        }
    };

    let caller =
        caller::authenticate_embedded_token(session, &payload, state.tokens.as_ref()).await;
    log.user_id = caller.user_id();

    let event = payload.event();
    info!(
        event = event,
        user_id = log.user_id,
        signature = log.signature.as_deref(),
        variant = log.variant.as_deref(),
        "cloudflare_webhook_received"
    );

    let Some(signature) = log.signature.as_deref() else {
        return Err(log.reject(WebhookError::MissingSignature));
    };
    let Some(variant) = log.variant.as_deref() else {
        return Err(log.reject(WebhookError::MissingVariant));
    };

    let selected = select_secret(variant, payload.app_id(), state.config.as_ref());
    let (variant, secret) = match selected {
        Ok(selected) => selected,
        Err(e) => return Err(log.reject(e)),
    };

    if !verify(body, &secret, signature) {
        return Err(log.reject(WebhookError::SignatureMismatch));
    }

    let wizard = Wizard::new(state.directory.as_ref(), &state.config.dsn_base_url, variant);
    let wizard_event = WizardEvent::from_event(event);

    match wizard.dispatch(wizard_event, &caller, payload.install.clone()).await {
        Ok(response) => {
            info!(
                event = event,
                user_id = log.user_id,
                signature = log.signature.as_deref(),
                variant = log.variant.as_deref(),
                options = response.install.options.len(),
                "cloudflare_webhook_handled"
            );
            Ok(response)
        }
        Err(e) => Err(log.reject(e)),
    }
}
