//! Error types for signature parsing and verification.
//!
//! Expected policy outcomes (untrusted root, revoked certificate, no
//! allow-list match) are never errors; they are reported as
//! [`SignatureIssue`](crate::verify::SignatureIssue)s. These types cover
//! structural corruption, unsupported inputs, I/O and cancellation.

use thiserror::Error;

/// Errors raised while reading, parsing or verifying a package signature.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The signature entry of the package container is malformed.
    #[error("invalid signature container metadata: {0}")]
    InvalidSignatureContainerMetadata(String),
    /// The signature entry could not be parsed into a valid signature.
    #[error("invalid package signature: {0}")]
    InvalidSignature(String),
    /// The package content could not be enumerated for hashing.
    #[error("invalid package content: {0}")]
    InvalidPackage(String),
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),
    #[error("unsupported signature format version {0}")]
    UnsupportedSignatureFormat(u32),
    /// Key material could not be decoded or located.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("a package signature verifier requires at least one provider")]
    NoProviders,
    /// Verification was cancelled by the caller.
    #[error("verification was cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when querying a revocation source.
///
/// These never escape the trust verifier: they degrade to the
/// unknown-revocation path.
#[derive(Debug, Error)]
pub enum RevocationError {
    /// The revocation responder could not be reached.
    #[error("revocation source unreachable: {0}")]
    Unreachable(String),
    /// The revocation data could not be parsed.
    #[error("failed to parse revocation data: {0}")]
    Parse(String),
}
