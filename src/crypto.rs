// At-rest encryption primitives for exported sessions
//
// The shield core never calls these; they exist for hosts that persist
// session snapshots and want them sealed. AES-256-GCM with the random
// 12-byte nonce prepended to the ciphertext, and Argon2id for deriving
// keys from passwords. Nothing here is tunable from the config file.
//
// NOTE: nothing in the CLI exercises this module; it is the contract
// surface for embedding hosts. Suppressing dead_code until then.
#![allow(dead_code)]

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{anyhow, bail, Result};
use argon2::{Algorithm, Argon2, Params, Version};

/// AES-256-GCM nonce size in bytes
const NONCE_LEN: usize = 12;

/// Argon2id cost parameters (64 MiB, 3 passes, single lane)
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 1;

/// AES-256-GCM seal/open around a fixed 32-byte key
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Encrypt plaintext; output layout is nonce || ciphertext || tag
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| anyhow!("encryption failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt data produced by `seal`
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            bail!("ciphertext too short");
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("decryption failed"))
    }
}

/// Generate a random 256-bit key
pub fn generate_key() -> [u8; 32] {
    Aes256Gcm::generate_key(OsRng).into()
}

/// Derive a 256-bit key from a password with Argon2id
///
/// The salt must be at least 8 bytes and unique per stored blob.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|err| anyhow!("invalid argon2 params: {err}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|err| anyhow!("key derivation failed: {err}"))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = generate_key();
        let encryptor = Encryptor::new(&key);

        let sealed = encryptor.seal(b"session snapshot").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"session snapshot");
        assert_eq!(encryptor.open(&sealed).unwrap(), b"session snapshot");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_key();
        let encryptor = Encryptor::new(&key);

        let mut sealed = encryptor.seal(b"session snapshot").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(encryptor.open(&sealed).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = Encryptor::new(&generate_key()).seal(b"data").unwrap();
        assert!(Encryptor::new(&generate_key()).open(&sealed).is_err());
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let encryptor = Encryptor::new(&generate_key());
        assert!(encryptor.open(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_derive_key_is_deterministic_per_salt() {
        let a = derive_key(b"correct horse battery", b"salt-salt").unwrap();
        let b = derive_key(b"correct horse battery", b"salt-salt").unwrap();
        let c = derive_key(b"correct horse battery", b"other-salt").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_derived_key_usable_for_encryption() {
        let key = derive_key(b"password", b"12345678").unwrap();
        let encryptor = Encryptor::new(&key);

        let sealed = encryptor.seal(b"payload").unwrap();
        assert_eq!(encryptor.open(&sealed).unwrap(), b"payload");
    }
}
