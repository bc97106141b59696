//! Webhook message authentication

use hmac::{Hmac, Mac};
use pedal_core::traits::SignatureVerifier;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the raw body, hex encoded
///
/// Accepts the digest bare or with a `sha256=` prefix, in either case.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSignatureVerifier;

impl HmacSignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Hex HMAC of `body` under `secret`
    pub fn sign(body: &[u8], secret: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for HmacSignatureVerifier {
    fn verify(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
        if secret.is_empty() {
            return false;
        }

        let presented = signature.trim();
        let presented = presented
            .strip_prefix("sha256=")
            .unwrap_or(presented)
            .to_ascii_lowercase();
        if presented.is_empty() {
            return false;
        }

        let Some(expected) = Self::sign(raw_body, secret) else {
            return false;
        };

        expected.as_bytes().ct_eq(presented.as_bytes()).unwrap_u8() == 1
    }
}
