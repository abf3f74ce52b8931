//! Ed25519 detached signatures over a canonical entry projection
//!
//! The signature covers a fixed six-field subset of the entry, serialized
//! as deterministic JSON with the keys in declaration order and no
//! whitespace. Fields outside the projection (department, provider, the
//! violation list) are protected by the hash chain, not the signature.

use crate::model::AuditEntry;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::SecondsFormat;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use serde::Serialize;

/// The exact byte layout that gets signed; field order is the wire contract
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalProjection<'a> {
    timestamp: String,
    user_id: &'a str,
    session_id: &'a str,
    request_hash: &'a str,
    action: &'a str,
    previous_entry_hash: &'a str,
}

/// Signs and verifies audit entries
pub struct Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Signer {
    /// Create a signer with a freshly generated key pair
    pub fn new() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create a signer from an existing private key
    /// Used by: hosts that persist the signing key across restarts
    #[allow(dead_code)]
    pub fn from_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Sign an entry; printable form is "ed25519:" + base64(signature)
    pub fn sign(&self, entry: &AuditEntry) -> Result<String> {
        let canonical = canonical_bytes(entry)?;
        let signature = self.signing_key.sign(&canonical);
        Ok(format!("ed25519:{}", BASE64.encode(signature.to_bytes())))
    }

    /// Verify a printable signature against an entry's canonical projection
    pub fn verify(&self, entry: &AuditEntry, signature: &str) -> bool {
        let Some(encoded) = signature.strip_prefix("ed25519:") else {
            return false;
        };
        let Ok(bytes) = BASE64.decode(encoded) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };
        let Ok(canonical) = canonical_bytes(entry) else {
            return false;
        };
        self.verifying_key.verify(&canonical, &signature).is_ok()
    }

    /// Used by: out-of-process verifiers that need the public key
    #[allow(dead_code)]
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.verifying_key.as_bytes())
    }
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_bytes(entry: &AuditEntry) -> Result<Vec<u8>> {
    serde_json::to_vec(&CanonicalProjection {
        timestamp: entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        user_id: &entry.user_id,
        session_id: &entry.session_id,
        request_hash: &entry.request_hash,
        action: entry.action.as_str(),
        previous_entry_hash: &entry.previous_entry_hash,
    })
    .context("failed to serialize canonical projection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use chrono::{TimeZone, Utc};

    fn entry() -> AuditEntry {
        AuditEntry {
            entry_id: "audit_0123456789ab".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            user_id: "u@x".into(),
            session_id: "sess_deadbeef0000".into(),
            department: "engineering".into(),
            provider: "openai".into(),
            request_hash: "aabbcc".into(),
            response_hash: None,
            was_sanitized: true,
            violations: vec![],
            action: Action::AllowWithSanitization,
            processing_time_ms: 7,
            signature: None,
            previous_entry_hash: "001122".into(),
        }
    }

    #[test]
    fn test_canonical_projection_layout() {
        let bytes = canonical_bytes(&entry()).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":"2026-03-14T09:26:53Z","userId":"u@x","sessionId":"sess_deadbeef0000","requestHash":"aabbcc","action":"allow_with_sanitization","previousEntryHash":"001122"}"#
        );
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = Signer::new();
        let entry = entry();

        let signature = signer.sign(&entry).unwrap();
        assert!(signature.starts_with("ed25519:"));
        assert!(signer.verify(&entry, &signature));
    }

    #[test]
    fn test_tampered_signed_field_fails() {
        let signer = Signer::new();
        let mut entry = entry();
        let signature = signer.sign(&entry).unwrap();

        entry.user_id = "attacker@x".into();
        assert!(!signer.verify(&entry, &signature));
    }

    #[test]
    fn test_fields_outside_projection_do_not_affect_signature() {
        let signer = Signer::new();
        let mut entry = entry();
        let signature = signer.sign(&entry).unwrap();

        // provider is covered by the hash chain, not the signature
        entry.provider = "someone_else".into();
        assert!(signer.verify(&entry, &signature));
    }

    #[test]
    fn test_malformed_signatures_rejected() {
        let signer = Signer::new();
        let entry = entry();

        assert!(!signer.verify(&entry, ""));
        assert!(!signer.verify(&entry, "rsa:abcd"));
        assert!(!signer.verify(&entry, "ed25519:!!!not-base64!!!"));
        assert!(!signer.verify(&entry, "ed25519:AAAA"));
    }

    #[test]
    fn test_different_keys_do_not_cross_verify() {
        let alice = Signer::new();
        let bob = Signer::new();
        let entry = entry();

        let signature = alice.sign(&entry).unwrap();
        assert!(!bob.verify(&entry, &signature));
    }
}
