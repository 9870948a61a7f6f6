//! Symmetric encryption of backend credentials at rest.
//!
//! Secrets are stored as an opaque `iv:tag:ciphertext` string (hex-encoded
//! components) produced by AES-256-GCM. A fresh random nonce is generated
//! per encryption call and the authentication tag is stored alongside the
//! ciphertext, so any tampering is detected on decrypt.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use archiva_common::{Error, Result};

/// Length of the AES-256 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of the GCM nonce in bytes.
pub const NONCE_LENGTH: usize = 12;

/// Length of the GCM authentication tag in bytes.
pub const TAG_LENGTH: usize = 16;

/// Environment variable holding the encryption secret.
pub const ENCRYPTION_KEY_VAR: &str = "STORAGE_ENCRYPTION_KEY";

/// Cipher for backend credentials.
///
/// Key material is zeroized on drop. The key is derived from an
/// environment-provided secret that must be at least [`KEY_LENGTH`] bytes;
/// validation happens lazily at first use, not at process start.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialCipher {
    key: [u8; KEY_LENGTH],
}

impl CredentialCipher {
    /// Create a cipher from a raw secret.
    ///
    /// # Errors
    /// - Returns `Error::Config` if the secret is shorter than [`KEY_LENGTH`] bytes
    pub fn new(secret: &str) -> Result<Self> {
        let bytes = secret.as_bytes();
        if bytes.len() < KEY_LENGTH {
            return Err(Error::Config(format!(
                "Encryption secret must be at least {} bytes",
                KEY_LENGTH
            )));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes[..KEY_LENGTH]);
        Ok(Self { key })
    }

    /// Create a cipher from the `STORAGE_ENCRYPTION_KEY` environment variable.
    ///
    /// # Errors
    /// - Returns `Error::Config` if the variable is unset or too short
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(ENCRYPTION_KEY_VAR).map_err(|_| {
            Error::Config(format!("{} is not configured", ENCRYPTION_KEY_VAR))
        })?;
        Self::new(&secret).map_err(|_| {
            Error::Config(format!(
                "{} is too short, must be at least {} characters",
                ENCRYPTION_KEY_VAR, KEY_LENGTH
            ))
        })
    }

    /// Encrypt a plaintext secret into the opaque `iv:tag:ciphertext` form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::Decryption)?;

        // The aead crate appends the tag; store it as its own component.
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(body)
        ))
    }

    /// Decrypt an opaque `iv:tag:ciphertext` secret.
    ///
    /// # Errors
    /// - Returns `Error::Decryption` for a malformed opaque string or a
    ///   failed authentication tag, with no detail about which check failed
    pub fn decrypt(&self, opaque: &str) -> Result<String> {
        let parts: Vec<&str> = opaque.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::Decryption);
        }

        let nonce_bytes = hex::decode(parts[0]).map_err(|_| Error::Decryption)?;
        let tag = hex::decode(parts[1]).map_err(|_| Error::Decryption)?;
        let body = hex::decode(parts[2]).map_err(|_| Error::Decryption)?;

        if nonce_bytes.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(Error::Decryption);
        }

        let mut sealed = body;
        sealed.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_slice())
            .map_err(|_| Error::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| Error::Decryption)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialCipher([REDACTED])")
    }
}
