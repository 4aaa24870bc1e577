//! Cloudflare webhook signature verification.
//!
//! Cloudflare signs the raw request body with HMAC-SHA256 and sends the hex
//! digest in `X-Signature-Hmac-Sha256-Hex`. `X-Signature-Key-Variant` names
//! which shared secret was used.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::{OptionsStore, SECRET_KEY_OPTION};
use crate::web::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature-Hmac-Sha256-Hex";
pub const VARIANT_HEADER: &str = "X-Signature-Key-Variant";

/// Well-known secret Cloudflare uses when previewing an app locally.
pub const TEST_SECRET: &str = "test-key";

/// App ids allowed to sign with [`TEST_SECRET`].
const LOCAL_APP_IDS: &[&str] = &["", "local"];

/// Which shared secret signed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVariant {
    Test,
    Production,
}

impl KeyVariant {
    pub fn parse(raw: &str) -> Result<Self, WebhookError> {
        match raw {
            "test" => Ok(Self::Test),
            "1" => Ok(Self::Production),
            _ => Err(WebhookError::InvalidVariant),
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

/// Pick the secret for `variant`.
///
/// The test secret is public, so it is refused unless the payload's app id
/// is empty or `local`. A missing app id counts as non-local.
pub fn select_secret(
    variant: &str,
    app_id: Option<&str>,
    options: &dyn OptionsStore,
) -> Result<(KeyVariant, String), WebhookError> {
    let variant = KeyVariant::parse(variant)?;

    match variant {
        KeyVariant::Test => {
            let is_local = app_id.map(|id| LOCAL_APP_IDS.contains(&id)).unwrap_or(false);
            if !is_local {
                return Err(WebhookError::TestVariantMisuse);
            }
            Ok((variant, TEST_SECRET.to_string()))
        }
        KeyVariant::Production => options
            .get(SECRET_KEY_OPTION)
            .filter(|s| !s.is_empty())
            .map(|secret| (variant, secret))
            .ok_or(WebhookError::SecretNotConfigured),
    }
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("cloudflare_signature_invalid_key");
            return None;
        }
    };

    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify `signature` against the raw `payload`.
///
/// The digest comparison is constant-time; only the length check
/// short-circuits.
pub fn verify(payload: &[u8], secret: &str, signature: &str) -> bool {
    let expected = match sign(payload, secret) {
        Some(s) => s,
        None => return false,
    };

    let valid: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "cloudflare_signature_mismatch"
        );
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn config_with_secret(secret: Option<&str>) -> Config {
        Config {
            cloudflare_secret_key: secret.map(str::to_string),
            ..Config::default()
        }
    }

    #[test]
    fn test_verify_valid() {
        let payload = br#"{"event":"preview"}"#;
        let signature = sign(payload, "secret").unwrap();
        assert!(verify(payload, "secret", &signature));
    }

    #[test]
    fn test_verify_any_flipped_byte_fails() {
        let payload = br#"{"event":"option-change:account","install":{}}"#;
        let signature = sign(payload, "secret").unwrap();

        for i in 0..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(!verify(payload, "secret", &tampered), "byte {} accepted", i);
        }
    }

    #[test]
    fn test_verify_wrong_secret_or_payload() {
        let payload = b"payload";
        let signature = sign(payload, "secret").unwrap();
        assert!(!verify(payload, "other", &signature));
        assert!(!verify(b"payload2", "secret", &signature));
    }

    #[test]
    fn test_verify_length_mismatch() {
        let payload = b"payload";
        let signature = sign(payload, "secret").unwrap();
        assert!(!verify(payload, "secret", &signature[..10]));
        assert!(!verify(payload, "secret", ""));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let payload = b"payload";
        let signature = sign(payload, "secret").unwrap().to_uppercase();
        assert!(!verify(payload, "secret", &signature));
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2
        let signature = sign(b"what do ya want for nothing?", "Jefe").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_select_secret_test_variant_local() {
        let config = config_with_secret(None);
        for app_id in ["", "local"] {
            let (variant, secret) = select_secret("test", Some(app_id), &config).unwrap();
            assert_eq!(variant, KeyVariant::Test);
            assert_eq!(secret, TEST_SECRET);
        }
    }

    #[test]
    fn test_select_secret_test_variant_real_app() {
        let config = config_with_secret(None);
        assert_eq!(
            select_secret("test", Some("some-real-app"), &config),
            Err(WebhookError::TestVariantMisuse)
        );
        assert_eq!(
            select_secret("test", None, &config),
            Err(WebhookError::TestVariantMisuse)
        );
    }

    #[test]
    fn test_select_secret_production() {
        let config = config_with_secret(Some("prod-secret"));
        let (variant, secret) = select_secret("1", Some("some-real-app"), &config).unwrap();
        assert_eq!(variant, KeyVariant::Production);
        assert_eq!(secret, "prod-secret");
    }

    #[test]
    fn test_select_secret_production_unset() {
        let config = config_with_secret(None);
        let err = select_secret("1", Some("app"), &config).unwrap_err();
        assert_eq!(err, WebhookError::SecretNotConfigured);
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_select_secret_invalid_variant() {
        let config = config_with_secret(Some("prod-secret"));
        assert_eq!(select_secret("2", Some("local"), &config), Err(WebhookError::InvalidVariant));
        assert_eq!(select_secret("", Some("local"), &config), Err(WebhookError::InvalidVariant));
    }
}
