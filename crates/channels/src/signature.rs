//! Webhook signature verification.
//!
//! LINE signs each webhook body with the channel secret:
//! `X-Line-Signature = base64(HMAC-SHA256(channel_secret, raw_body))`.
//! The digest is compared in constant time via `verify_slice`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use ragline_config::LineConfig;
use ragline_core::error::ChannelError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
enum Policy {
    Verify(Vec<u8>),
    /// No secret configured: nothing can be authenticated.
    RejectAll,
    /// No secret, and unsigned requests explicitly allowed.
    AcceptAll,
}

/// Checks `X-Line-Signature` headers against the channel secret.
///
/// Fails closed: with no secret (or an empty one) every request is rejected,
/// unless the configuration opts out of verification.
#[derive(Clone)]
pub struct SignatureVerifier {
    policy: Policy,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let policy = match self.policy {
            Policy::Verify(_) => "verify",
            Policy::RejectAll => "reject_all",
            Policy::AcceptAll => "accept_all",
        };
        f.debug_struct("SignatureVerifier")
            .field("policy", &policy)
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        let policy = match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Policy::Verify(secret.as_bytes().to_vec()),
            None => Policy::RejectAll,
        };
        Self { policy }
    }

    /// Accepts every request without checking. Only reachable through an
    /// explicit `line.skip_signature_verification`.
    pub fn accept_unsigned() -> Self {
        Self {
            policy: Policy::AcceptAll,
        }
    }

    /// A configured secret always wins over `skip_signature_verification`.
    pub fn from_config(config: &LineConfig) -> Self {
        let verifier = Self::new(config.channel_secret.as_deref());
        match verifier.policy {
            Policy::RejectAll if config.skip_signature_verification => Self::accept_unsigned(),
            _ => verifier,
        }
    }

    /// Whether a secret is configured.
    pub fn is_enabled(&self) -> bool {
        matches!(self.policy, Policy::Verify(_))
    }

    pub fn accepts_unsigned(&self) -> bool {
        matches!(self.policy, Policy::AcceptAll)
    }

    /// Verify `signature` over `body`. A missing header always fails when a
    /// secret is configured.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), ChannelError> {
        let secret = match &self.policy {
            Policy::Verify(secret) => secret,
            Policy::RejectAll => return Err(ChannelError::InvalidSignature),
            Policy::AcceptAll => return Ok(()),
        };
        let signature = signature.ok_or(ChannelError::InvalidSignature)?;

        let provided = STANDARD
            .decode(signature.trim())
            .map_err(|_| ChannelError::InvalidSignature)?;

        let mut mac =
            HmacSha256::new_from_slice(secret).map_err(|_| ChannelError::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| ChannelError::InvalidSignature)
    }

    /// Compute the signature for `body`. Used by local tooling and tests.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let Policy::Verify(secret) = &self.policy else {
            return None;
        };
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(body);
        Some(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"destination":"U0","events":[]}"#;

    #[test]
    fn no_secret_rejects_everything() {
        for verifier in [SignatureVerifier::new(None), SignatureVerifier::new(Some(""))] {
            assert!(!verifier.is_enabled());
            assert!(!verifier.accepts_unsigned());
            assert!(verifier.verify(BODY, None).is_err());
            assert!(verifier.verify(BODY, Some("garbage")).is_err());
            assert!(verifier.sign(BODY).is_none());
        }
    }

    #[test]
    fn default_config_fails_closed() {
        let verifier = SignatureVerifier::from_config(&LineConfig::default());
        assert!(matches!(
            verifier.verify(BODY, None),
            Err(ChannelError::InvalidSignature)
        ));
    }

    #[test]
    fn explicit_opt_out_accepts_unsigned() {
        let config = LineConfig {
            skip_signature_verification: true,
            ..LineConfig::default()
        };
        let verifier = SignatureVerifier::from_config(&config);
        assert!(verifier.accepts_unsigned());
        assert!(verifier.verify(BODY, None).is_ok());
    }

    #[test]
    fn configured_secret_ignores_opt_out() {
        let config = LineConfig {
            channel_secret: Some("channel-secret".into()),
            skip_signature_verification: true,
            ..LineConfig::default()
        };
        let verifier = SignatureVerifier::from_config(&config);
        assert!(verifier.is_enabled());
        assert!(verifier.verify(BODY, Some("garbage")).is_err());
    }

    #[test]
    fn valid_signature_passes() {
        let verifier = SignatureVerifier::new(Some("channel-secret"));
        let signature = verifier.sign(BODY).unwrap();
        assert!(verifier.verify(BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog"), base64.
        let verifier = SignatureVerifier::new(Some("key"));
        assert!(verifier
            .verify(
                b"The quick brown fox jumps over the lazy dog",
                Some("97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="),
            )
            .is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let verifier = SignatureVerifier::new(Some("channel-secret"));
        let signature = verifier.sign(BODY).unwrap();
        let err = verifier.verify(b"{}", Some(&signature)).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidSignature));
    }

    #[test]
    fn missing_or_undecodable_header_fails() {
        let verifier = SignatureVerifier::new(Some("channel-secret"));
        assert!(verifier.verify(BODY, None).is_err());
        assert!(verifier.verify(BODY, Some("%%%not base64%%%")).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let verifier = SignatureVerifier::new(Some("super-secret"));
        assert!(!format!("{verifier:?}").contains("super-secret"));
    }
}
