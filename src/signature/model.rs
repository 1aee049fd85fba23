use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::signature::canonical::canonical_bytes;
use crate::signature::certificate::Certificate;

/// Version of the signature entry format this crate reads and writes.
pub const SIGNATURE_FORMAT_VERSION: u32 = 1;

// ── Roles ───────────────────────────────────────────────────────────────────

/// Physical position of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    PrimarySignature,
    Countersignature,
}

/// Role claimed by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Author,
    Repository,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub service_index_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_owners: Option<Vec<String>>,
}

impl RepositoryMetadata {
    pub fn new(service_index_url: Url) -> Self {
        Self {
            service_index_url,
            package_owners: None,
        }
    }

    pub fn with_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_owners = Some(owners.into_iter().map(Into::into).collect());
        self
    }
}

// ── Timestamp ───────────────────────────────────────────────────────────────

/// The fields a timestamp authority signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampToken {
    pub serial_number: String,
    pub generalized_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_seconds: Option<u32>,
    pub hash_algorithm: HashAlgorithm,
    /// Hex digest of the timestamped signature value.
    pub message_imprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub token: TimestampToken,
    pub tsa_certificate: Certificate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_certificates: Vec<Certificate>,
    pub signature_value: String,
}

impl Timestamp {
    pub fn generalized_time(&self) -> DateTime<Utc> {
        self.token.generalized_time
    }

    fn accuracy(&self) -> Duration {
        Duration::seconds(i64::from(self.token.accuracy_seconds.unwrap_or(0)))
    }

    /// Earliest instant the signature may have been produced.
    pub fn lower_limit(&self) -> DateTime<Utc> {
        self.token.generalized_time - self.accuracy()
    }

    /// Latest instant the signature may have been produced.
    pub fn upper_limit(&self) -> DateTime<Utc> {
        self.token.generalized_time + self.accuracy()
    }

    pub fn signed_bytes(&self) -> Result<Vec<u8>, VerifyError> {
        canonical_bytes(&self.token)
    }
}

// ── Signature ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub placement: Placement,
    pub target: Target,
    pub signer_certificate: Certificate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_certificates: Vec<Certificate>,
    pub digest_algorithm: HashAlgorithm,
    /// Hex digest bound by this signature: the package content hash for a
    /// primary signature, the primary signature value for a countersignature.
    pub signed_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamps: Vec<Timestamp>,
    /// Base64 Ed25519 signature over the canonical signed attributes.
    pub signature_value: String,
}

/// Everything covered by `Signature::signature_value`.
#[derive(Serialize)]
struct SignedAttributes<'a> {
    placement: Placement,
    target: Target,
    digest_algorithm: HashAlgorithm,
    signed_digest: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<&'a RepositoryMetadata>,
    signing_certificate_sha256: String,
}

impl Signature {
    /// Canonical bytes the signer signs.
    pub fn signed_attributes(&self) -> Result<Vec<u8>, VerifyError> {
        canonical_bytes(&SignedAttributes {
            placement: self.placement,
            target: self.target,
            digest_algorithm: self.digest_algorithm,
            signed_digest: &self.signed_digest,
            repository: self.repository.as_ref(),
            signing_certificate_sha256: self
                .signer_certificate
                .fingerprint(HashAlgorithm::Sha256)?,
        })
    }

    /// Whether `signature_value` verifies with the signer certificate.
    pub fn verify_signature_value(&self) -> Result<bool, VerifyError> {
        Ok(self
            .signer_certificate
            .verify_signed(&self.signed_attributes()?, &self.signature_value))
    }

    /// Digest a countersignature over this signature must carry.
    pub fn countersignature_digest(&self, algorithm: HashAlgorithm) -> String {
        hash::hex_encode(&algorithm.digest(self.signature_value.as_bytes()))
    }

    pub fn package_owners(&self) -> &[String] {
        self.repository
            .as_ref()
            .and_then(|r| r.package_owners.as_deref())
            .unwrap_or(&[])
    }

    pub fn describe(&self) -> String {
        let role = match (self.placement, self.target) {
            (Placement::Countersignature, _) => "repository countersignature",
            (_, Target::Author) => "author primary signature",
            (_, Target::Repository) => "repository primary signature",
            (_, Target::Unknown) => "primary signature",
        };
        format!("{} ({})", role, self.signer_certificate.subject())
    }
}

/// The signature entry of a package: a primary signature and an optional
/// repository countersignature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySignature {
    pub format_version: u32,
    pub signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countersignature: Option<Signature>,
}

impl PrimarySignature {
    pub fn new(signature: Signature) -> Self {
        Self {
            format_version: SIGNATURE_FORMAT_VERSION,
            signature,
            countersignature: None,
        }
    }

    /// Parse a signature entry and enforce its structural rules.
    pub fn from_json(bytes: &[u8]) -> Result<Self, VerifyError> {
        let parsed: PrimarySignature = serde_json::from_slice(bytes)
            .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, VerifyError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    fn validate(&self) -> Result<(), VerifyError> {
        if self.format_version != SIGNATURE_FORMAT_VERSION {
            return Err(VerifyError::UnsupportedSignatureFormat(self.format_version));
        }
        if self.signature.placement != Placement::PrimarySignature {
            return Err(VerifyError::InvalidSignature(
                "the primary signature has a countersignature placement".to_string(),
            ));
        }
        validate_repository_metadata(&self.signature)?;

        if let Some(counter) = &self.countersignature {
            if counter.placement != Placement::Countersignature {
                return Err(VerifyError::InvalidSignature(
                    "the countersignature has a primary signature placement".to_string(),
                ));
            }
            if counter.target != Target::Repository {
                return Err(VerifyError::InvalidSignature(
                    "a countersignature must be a repository countersignature".to_string(),
                ));
            }
            validate_repository_metadata(counter)?;
        }
        Ok(())
    }

    /// A repository primary signature must not carry a repository
    /// countersignature.
    pub fn has_illegal_combination(&self) -> bool {
        self.signature.target == Target::Repository && self.countersignature.is_some()
    }

    /// Every signature in the entry, primary first.
    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        std::iter::once(&self.signature).chain(self.countersignature.as_ref())
    }
}

fn validate_repository_metadata(signature: &Signature) -> Result<(), VerifyError> {
    match (signature.target, &signature.repository) {
        (Target::Repository, None) => Err(VerifyError::InvalidSignature(
            "a repository signature requires a service index URL".to_string(),
        )),
        (Target::Author | Target::Unknown, Some(_)) => Err(VerifyError::InvalidSignature(
            "only repository signatures may carry repository metadata".to_string(),
        )),
        _ => Ok(()),
    }
}
