use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::VerifyError;

/// Environment variable holding a base64 Ed25519 secret key for `pkgsig sign`.
pub const SIGNING_KEY_ENV: &str = "PKGSIG_SIGNING_KEY_B64";

/// Generate a new Ed25519 keypair. Returns (secret_key_b64, public_key_b64).
pub fn keygen() -> (Zeroizing<String>, String) {
    let signing_key = generate_signing_key();
    (
        Zeroizing::new(B64.encode(signing_key.to_bytes())),
        public_key_b64(&signing_key),
    )
}

pub fn generate_signing_key() -> SigningKey {
    let mut csprng = rand::rngs::OsRng;
    SigningKey::generate(&mut csprng)
}

/// Decode an Ed25519 secret key (base64-encoded 32-byte seed).
pub fn signing_key_from_b64(secret_key_b64: &str) -> Result<SigningKey, VerifyError> {
    let sk_bytes = Zeroizing::new(
        B64.decode(secret_key_b64.trim())
            .map_err(|e| VerifyError::InvalidKey(format!("decoding secret key base64: {e}")))?,
    );
    let sk_array: [u8; 32] = sk_bytes
        .as_slice()
        .try_into()
        .map_err(|_| VerifyError::InvalidKey("secret key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&sk_array))
}

pub fn public_key_b64(signing_key: &SigningKey) -> String {
    B64.encode(signing_key.verifying_key().to_bytes())
}

/// Sign data, returning the base64 signature.
pub fn sign(signing_key: &SigningKey, data: &[u8]) -> String {
    B64.encode(signing_key.sign(data).to_bytes())
}

/// Verify an Ed25519 signature (base64) against a public key (base64).
pub fn verify(public_key_b64: &str, data: &[u8], signature_b64: &str) -> Result<bool, VerifyError> {
    let pk_bytes = B64
        .decode(public_key_b64)
        .map_err(|e| VerifyError::InvalidKey(format!("decoding public key base64: {e}")))?;
    let pk_array: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| VerifyError::InvalidKey("public key must be 32 bytes".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&pk_array)
        .map_err(|e| VerifyError::InvalidKey(format!("invalid Ed25519 public key: {e}")))?;

    let sig_bytes = match B64.decode(signature_b64) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let sig_array: [u8; 64] = match sig_bytes.try_into() {
        Ok(array) => array,
        Err(_) => return Ok(false),
    };
    let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

    Ok(verifying_key.verify(data, &signature).is_ok())
}

/// Read a base64 secret key file, ignoring the environment.
pub fn read_secret_key_file(path: &Path) -> Result<SigningKey, VerifyError> {
    let contents = Zeroizing::new(std::fs::read_to_string(path)?);
    signing_key_from_b64(&contents)
}

/// Load a secret key from either the environment variable or a keyfile path.
pub fn load_secret_key(keyfile: Option<&Path>) -> Result<SigningKey, VerifyError> {
    if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
        let key = Zeroizing::new(key);
        if !key.is_empty() {
            return signing_key_from_b64(&key);
        }
    }

    if let Some(path) = keyfile {
        return read_secret_key_file(path);
    }

    Err(VerifyError::InvalidKey(format!(
        "no signing key found; set {SIGNING_KEY_ENV} or pass --keyfile <path>"
    )))
}
