//! Certificates for signers and timestamp authorities.
//!
//! A certificate is a canonical-JSON body signed with Ed25519 by its
//! issuer. The certificate's identity for fingerprinting is the canonical
//! encoding of the whole certificate (body and issuer signature).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::sign;
use crate::signature::canonical::canonical_bytes;

/// Extended key usages a certificate may be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPurpose {
    CodeSigning,
    TimeStamping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBody {
    pub serial_number: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Base64 Ed25519 public key.
    pub public_key: String,
    #[serde(default)]
    pub is_ca: bool,
    /// Empty means the certificate is not restricted to specific purposes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_purposes: Vec<KeyPurpose>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub body: CertificateBody,
    /// Base64 Ed25519 signature of the issuer over the canonical body.
    pub signature: String,
}

impl Certificate {
    pub fn subject(&self) -> &str {
        &self.body.subject
    }

    pub fn serial_number(&self) -> &str {
        &self.body.serial_number
    }

    /// The canonical encoding that fingerprints are computed over.
    pub fn raw_data(&self) -> Result<Vec<u8>, VerifyError> {
        canonical_bytes(self)
    }

    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Result<String, VerifyError> {
        Ok(hash::fingerprint(algorithm, &self.raw_data()?))
    }

    /// `not_before <= at < not_after`
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.body.not_before <= at && at < self.body.not_after
    }

    pub fn has_purpose(&self, purpose: KeyPurpose) -> bool {
        self.body.key_purposes.is_empty() || self.body.key_purposes.contains(&purpose)
    }

    /// Whether `issuer` names and signed this certificate.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        self.body.issuer == issuer.body.subject
            && canonical_bytes(&self.body)
                .ok()
                .and_then(|tbs| sign::verify(&issuer.body.public_key, &tbs, &self.signature).ok())
                .unwrap_or(false)
    }

    pub fn is_self_issued(&self) -> bool {
        self.body.subject == self.body.issuer && self.is_issued_by(self)
    }

    pub fn verify_signed(&self, data: &[u8], signature_b64: &str) -> bool {
        sign::verify(&self.body.public_key, data, signature_b64).unwrap_or(false)
    }
}
