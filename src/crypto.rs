//! Secret encryption module using AES-256-GCM
//!
//! Credential blobs and connector key material are encrypted at rest with
//! AES-256-GCM. The ciphertext carries a version byte and nonce, and the
//! additional authenticated data binds each payload to its tenant (and, for
//! key material, to its key slot) so rows cannot be swapped between tenants.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

/// Type alias for crypto keys
pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "Invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // Version byte + nonce prefix the ciphertext
    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    if ciphertext[0] != VERSION_ENCRYPTED {
        return Err(CryptoError::InvalidFormat);
    }

    if ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// AAD for a tenant's credential blob
fn credential_aad(tenant_id: &str) -> Vec<u8> {
    format!("credentials|{}", tenant_id).into_bytes()
}

/// AAD for one key-material slot
fn key_material_aad(tenant_id: &str, key_type: &str, key_id: &str) -> Vec<u8> {
    format!("auth_key|{}|{}|{}", tenant_id, key_type, key_id).into_bytes()
}

/// Encrypt a tenant's serialized credential blob
pub fn encrypt_credential_blob(
    key: &CryptoKey,
    tenant_id: &str,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, &credential_aad(tenant_id), plaintext)
}

/// Decrypt a tenant's credential blob
pub fn decrypt_credential_blob(
    key: &CryptoKey,
    tenant_id: &str,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    decrypt_bytes(key, &credential_aad(tenant_id), ciphertext)
}

/// Encrypt one piece of connector key material
pub fn encrypt_key_material(
    key: &CryptoKey,
    tenant_id: &str,
    key_type: &str,
    key_id: &str,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    encrypt_bytes(key, &key_material_aad(tenant_id, key_type, key_id), plaintext)
}

/// Decrypt one piece of connector key material
pub fn decrypt_key_material(
    key: &CryptoKey,
    tenant_id: &str,
    key_type: &str,
    key_id: &str,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    decrypt_bytes(key, &key_material_aad(tenant_id, key_type, key_id), ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![7u8; 32]).expect("32-byte key")
    }

    #[test]
    fn credential_blob_round_trip() {
        let key = test_key();
        let plaintext = br#"{"registration_id":42}"#;

        let ciphertext = encrypt_credential_blob(&key, "tenant-a", plaintext).unwrap();
        assert_eq!(ciphertext[0], VERSION_ENCRYPTED);
        assert_ne!(&ciphertext[MIN_ENCRYPTED_LEN..], plaintext.as_slice());

        let decrypted = decrypt_credential_blob(&key, "tenant-a", &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn aad_binds_tenant() {
        let key = test_key();
        let ciphertext = encrypt_credential_blob(&key, "tenant-a", b"secret").unwrap();

        let result = decrypt_credential_blob(&key, "tenant-b", &ciphertext);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn aad_binds_key_slot() {
        let key = test_key();
        let ciphertext =
            encrypt_key_material(&key, "tenant-a", "session", "1", b"material").unwrap();

        assert!(decrypt_key_material(&key, "tenant-a", "session", "1", &ciphertext).is_ok());
        assert!(decrypt_key_material(&key, "tenant-a", "session", "2", &ciphertext).is_err());
        assert!(decrypt_key_material(&key, "tenant-a", "pre-key", "1", &ciphertext).is_err());
    }

    #[test]
    fn rejects_short_or_unversioned_ciphertext() {
        let key = test_key();

        assert!(matches!(
            decrypt_credential_blob(&key, "t", &[]),
            Err(CryptoError::EmptyCiphertext)
        ));
        assert!(matches!(
            decrypt_credential_blob(&key, "t", &[0x00, 1, 2, 3]),
            Err(CryptoError::InvalidFormat)
        ));
        assert!(matches!(
            decrypt_credential_blob(&key, "t", &[VERSION_ENCRYPTED, 1, 2, 3]),
            Err(CryptoError::InvalidFormat)
        ));
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
        assert!(CryptoKey::new(vec![0u8; 32]).is_ok());
    }
}
