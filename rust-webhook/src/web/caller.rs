//! Caller identity for a single webhook request.
//!
//! A [`CallerContext`] is built once, before dispatch, and then only read.
//! Identity comes from the `Authorization: Bearer` header when present, and
//! otherwise from the token Cloudflare embeds in the payload. Any failure
//! along the way leaves the caller anonymous.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{info, warn};

use crate::directory::{ApiToken, TokenAuthenticator, User};
use crate::web::error::WebhookError;
use crate::web::payload::InstallPayload;

/// Where an identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    Header,
    Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
    pub token: ApiToken,
    pub source: AuthSource,
}

/// The (possibly anonymous) caller of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    identity: Option<Identity>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn authenticated(user: User, token: ApiToken, source: AuthSource) -> Self {
        Self {
            identity: Some(Identity { user, token, source }),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.identity.as_ref().map(|i| &i.user)
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// The caller's user, or `Unauthenticated` for steps that need one.
    pub fn require_user(&self) -> Result<&User, WebhookError> {
        self.user().ok_or(WebhookError::Unauthenticated)
    }
}

/// Extract a bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Resolve the header identity, if any.
pub async fn authenticate_header(
    headers: &HeaderMap,
    tokens: &dyn TokenAuthenticator,
) -> CallerContext {
    let Some(token) = bearer_token(headers) else {
        return CallerContext::anonymous();
    };

    match tokens.authenticate(token).await {
        Ok((user, token)) => CallerContext::authenticated(user, token, AuthSource::Header),
        Err(e) => {
            warn!(error = %e, "cloudflare_header_token_rejected");
            CallerContext::anonymous()
        }
    }
}

/// Adopt the payload's embedded token when the caller is still anonymous.
pub async fn authenticate_embedded_token(
    caller: CallerContext,
    payload: &InstallPayload,
    tokens: &dyn TokenAuthenticator,
) -> CallerContext {
    if caller.is_authenticated() {
        return caller;
    }

    let Some(token) = payload.embedded_token() else {
        return caller;
    };

    match tokens.authenticate(token).await {
        Ok((user, token)) => {
            info!(user_id = user.id, token_id = token.id, "cloudflare_embedded_token_accepted");
            CallerContext::authenticated(user, token, AuthSource::Payload)
        }
        Err(e) => {
            warn!(error = %e, "cloudflare_embedded_token_rejected");
            caller
        }
    }
}

/// Build the caller for a request: header identity first, then the payload token.
pub async fn authenticate(
    headers: &HeaderMap,
    payload: &InstallPayload,
    tokens: &dyn TokenAuthenticator,
) -> CallerContext {
    let caller = authenticate_header(headers, tokens).await;
    authenticate_embedded_token(caller, payload, tokens).await
}
