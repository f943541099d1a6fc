//! AES-256-GCM record encryption.
//!
//! A record is `base64(nonce ∥ tag ∥ ciphertext)` with a fresh 12-byte
//! nonce per write. Decryption fails closed: any malformed, tampered or
//! wrong-key record yields `None`.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CredentialError, CredentialResult};

/// PBKDF2 iterations for key derivation.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
pub const SALT_LENGTH: usize = 32;

/// Nonce length for AES-GCM.
const NONCE_LENGTH: usize = 12;

/// Authentication tag length for AES-GCM.
const TAG_LENGTH: usize = 16;

/// Raw key bytes, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// Encrypts and decrypts vault records.
pub struct SecretCipher {
    key: EncryptionKey,
}

impl SecretCipher {
    /// Derives the key from a passphrase and the vault salt.
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Self {
        let mut key = EncryptionKey([0u8; 32]);
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key.0);
        Self { key }
    }

    /// A random key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        let mut key = EncryptionKey([0u8; 32]);
        OsRng.fill_bytes(&mut key.0);
        Self { key }
    }

    /// Fresh random salt for a new vault.
    pub fn generate_salt() -> Vec<u8> {
        let mut salt = vec![0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        salt
    }

    /// Encrypts `plaintext` into a base64 record.
    pub fn encrypt(&self, plaintext: &str) -> CredentialResult<String> {
        let cipher = self.key.cipher();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        // aes-gcm appends the tag to the ciphertext.
        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CredentialError::Encryption(format!("Encryption failed: {}", e)))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

        let mut record = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        record.extend_from_slice(&nonce);
        record.extend_from_slice(tag);
        record.extend_from_slice(ciphertext);
        Ok(STANDARD.encode(record))
    }

    /// Decrypts a record, or `None` if it is malformed or fails authentication.
    pub fn decrypt(&self, record: &str) -> Option<String> {
        let bytes = STANDARD.decode(record.trim()).ok()?;
        if bytes.len() < NONCE_LENGTH + TAG_LENGTH {
            return None;
        }
        let (nonce, rest) = bytes.split_at(NONCE_LENGTH);
        let (tag, ciphertext) = rest.split_at(TAG_LENGTH);

        let mut sealed = Vec::with_capacity(rest.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let cipher = self.key.cipher();
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), sealed.as_ref()).ok()?;
        String::from_utf8(plaintext).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = SecretCipher::from_passphrase("correct horse", b"salt-salt-salt-salt");
        for secret in ["sk-abc123", "", "ключ-🔑", &"x".repeat(4096)] {
            let record = cipher.encrypt(secret).unwrap();
            assert_eq!(cipher.decrypt(&record).as_deref(), Some(secret));
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_write() {
        let cipher = SecretCipher::ephemeral();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_record_layout() {
        let cipher = SecretCipher::ephemeral();
        let record = STANDARD.decode(cipher.encrypt("abcd").unwrap()).unwrap();
        assert_eq!(record.len(), NONCE_LENGTH + TAG_LENGTH + 4);
    }

    #[test]
    fn test_tampered_record_is_absent() {
        let cipher = SecretCipher::ephemeral();
        let mut record = STANDARD.decode(cipher.encrypt("sk-abc").unwrap()).unwrap();
        let last = record.len() - 1;
        record[last] ^= 0x01;
        assert_eq!(cipher.decrypt(&STANDARD.encode(&record)), None);

        // Tag bytes too.
        let mut record = STANDARD.decode(cipher.encrypt("sk-abc").unwrap()).unwrap();
        record[NONCE_LENGTH] ^= 0x80;
        assert_eq!(cipher.decrypt(&STANDARD.encode(&record)), None);
    }

    #[test]
    fn test_wrong_key_and_garbage_are_absent() {
        let salt = SecretCipher::generate_salt();
        let right = SecretCipher::from_passphrase("right", &salt);
        let wrong = SecretCipher::from_passphrase("wrong", &salt);
        let record = right.encrypt("sk-abc").unwrap();

        assert_eq!(wrong.decrypt(&record), None);
        assert_eq!(right.decrypt("not base64 !!"), None);
        assert_eq!(right.decrypt(&STANDARD.encode([0u8; 8])), None);
    }

    #[test]
    fn test_salt_changes_key() {
        let a = SecretCipher::from_passphrase("pw", b"salt-a");
        let b = SecretCipher::from_passphrase("pw", b"salt-b");
        assert_eq!(b.decrypt(&a.encrypt("v").unwrap()), None);
    }
}
