use crate::error::{ClientError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

// ChaCha20Poly1305 for authenticated encryption
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

/// A payload sealed under a passphrase-derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub version: u8,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypt data with a passphrase using ChaCha20Poly1305
pub fn seal(data: &[u8], passphrase: &str) -> Result<SealedPayload> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let cipher = ChaCha20Poly1305::new(&key);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| ClientError::crypto(format!("Encryption failed: {}", e)))?;

    Ok(SealedPayload {
        version: 1,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypt a sealed payload with its passphrase
pub fn open(sealed: &SealedPayload, passphrase: &str) -> Result<Vec<u8>> {
    if sealed.nonce.len() != NONCE_SIZE {
        return Err(ClientError::crypto("Malformed nonce in sealed payload"));
    }

    let key = derive_key(passphrase, &sealed.salt);
    let cipher = ChaCha20Poly1305::new(&key);
    let nonce = Nonce::from_slice(&sealed.nonce);

    cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|e| ClientError::crypto(format!("Decryption failed: {}", e)))
}

/// Derive encryption key from passphrase using PBKDF2
fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    use pbkdf2::pbkdf2_hmac;
    use sha2::Sha256;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let data = br#"{"x":3,"y":4,"nonce":"42"}"#;
        let sealed = seal(data, "hunter2").unwrap();

        assert_ne!(sealed.ciphertext.as_slice(), data.as_slice());
        assert_eq!(open(&sealed, "hunter2").unwrap(), data);
    }

    #[test]
    fn test_wrong_passphrase() {
        let sealed = seal(b"secret", "right").unwrap();
        assert!(matches!(open(&sealed, "wrong"), Err(ClientError::Crypto(_))));
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_seal() {
        let a = seal(b"same", "pw").unwrap();
        let b = seal(b"same", "pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
