//! Request-terminal webhook failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Reasons a webhook request is rejected.
///
/// None of these are retried. Directory lookup misses are not errors; they
/// halt the wizard instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("request body is not a valid install payload")]
    MalformedPayload,
    #[error("signature header missing")]
    MissingSignature,
    #[error("key variant header missing")]
    MissingVariant,
    #[error("unknown key variant")]
    InvalidVariant,
    #[error("test key variant used for a non-local app")]
    TestVariantMisuse,
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("production secret is not configured")]
    SecretNotConfigured,
    #[error("authentication required")]
    Unauthenticated,
}

/// Body returned with a 401.
#[derive(Debug, Serialize)]
pub struct ProceedResponse {
    pub proceed: bool,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Short tag identifying the failure in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "invalid-json",
            Self::MissingSignature => "missing-signature",
            Self::MissingVariant => "missing-variant",
            Self::InvalidVariant => "invalid-variant",
            Self::TestVariantMisuse => "test-variant-misuse",
            Self::SignatureMismatch => "invalid-signature",
            Self::SecretNotConfigured => "secret-not-configured",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => {
                (self.status(), Json(ProceedResponse { proceed: false })).into_response()
            }
            _ => self.status().into_response(),
        }
    }
}
