//! Credential sealing for the credential store.
//!
//! API keys are stored as an opaque string: base64 over a random 96-bit
//! nonce followed by the AES-256-GCM ciphertext (tag appended). The key
//! comes from the `ENCRYPTION_KEY` environment variable, base64-encoded,
//! 32 bytes once decoded. Decryption happens only at call sites that are
//! about to talk to the memory backend.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const KEY_ENV: &str = "ENCRYPTION_KEY";
const NONCE_LEN: usize = 12;

fn load_key() -> Result<[u8; 32]> {
    let encoded = std::env::var(KEY_ENV)
        .map_err(|_| anyhow!("{} is not set; cannot seal or unseal credentials", KEY_ENV))?;
    let bytes = BASE64
        .decode(encoded.trim())
        .with_context(|| format!("{} is not valid base64", KEY_ENV))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("{} must decode to exactly 32 bytes", KEY_ENV))
}

/// Seal a plaintext credential into its storable form.
pub fn encrypt_credential(plaintext: &str) -> Result<String> {
    let key = load_key()?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| anyhow!("credential encryption failed"))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
    envelope.extend_from_slice(nonce.as_slice());
    envelope.extend_from_slice(&sealed);
    Ok(BASE64.encode(envelope))
}

/// Unseal a credential previously produced by [`encrypt_credential`].
pub fn decrypt_credential(envelope: &str) -> Result<String> {
    let key = load_key()?;
    let bytes = BASE64
        .decode(envelope)
        .context("stored credential is not valid base64")?;
    if bytes.len() <= NONCE_LEN {
        return Err(anyhow!("stored credential is too short"));
    }
    let (nonce, sealed) = bytes.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| anyhow!("credential decryption failed (wrong key or corrupt data)"))?;
    String::from_utf8(plain).context("decrypted credential is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_test_key() {
        // 32 zero bytes, base64-encoded. Shared by all tests in this module.
        std::env::set_var(KEY_ENV, BASE64.encode([0u8; 32]));
    }

    #[test]
    fn round_trip() {
        install_test_key();
        let sealed = encrypt_credential("sk-live-abc123").unwrap();
        assert_ne!(sealed, "sk-live-abc123");
        assert_eq!(decrypt_credential(&sealed).unwrap(), "sk-live-abc123");
    }

    #[test]
    fn nonce_makes_envelopes_distinct() {
        install_test_key();
        let a = encrypt_credential("same").unwrap();
        let b = encrypt_credential("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_envelope_is_rejected() {
        install_test_key();
        let sealed = encrypt_credential("secret").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(decrypt_credential(&BASE64.encode(bytes)).is_err());
    }
}
