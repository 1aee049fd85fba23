// integrity.rs — Package integrity provider
//
// Checks the primary signature value, then recomputes the package content
// hash (signature entry excluded) and compares it with the digest the
// primary signature binds. Countersignature binding is checked by the trust
// provider, which decides whether a countersignature is evaluated at all.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::VerifyError;
use crate::hash;
use crate::package::PackageReader;
use crate::signature::PrimarySignature;
use crate::verify::provider::VerificationProvider;
use crate::verify::result::{
    IssueCode, SignatureIssue, SignatureVerificationStatus, VerificationResult,
};
use crate::verify::settings::PolicySettings;

pub const INTEGRITY_PROVIDER: &str = "integrity";

#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VerificationProvider for IntegrityVerifier {
    fn name(&self) -> &'static str {
        INTEGRITY_PROVIDER
    }

    fn is_gate(&self) -> bool {
        true
    }

    async fn verify(
        &self,
        package: &dyn PackageReader,
        signature: &PrimarySignature,
        _settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, VerifyError> {
        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }
        let mut issues = Vec::new();
        let primary = &signature.signature;

        if !primary.verify_signature_value()? {
            issues.push(SignatureIssue::error(
                IssueCode::SignatureInvalid,
                "The package signature is invalid or cannot be verified on this platform.",
            ));
        }

        let actual = package.content_hash(primary.digest_algorithm)?;
        let expected = hash::hex_decode(&primary.signed_digest);
        if expected.as_deref() != Some(actual.as_slice()) {
            debug!(
                package = %package.identity(),
                algorithm = %primary.digest_algorithm,
                "content hash mismatch"
            );
            issues.push(SignatureIssue::error(
                IssueCode::PackageIntegrityCheckFailed,
                "The package integrity check failed. The package has been tampered with since being signed.",
            ));
        }

        let trust = if issues.is_empty() {
            SignatureVerificationStatus::Valid
        } else {
            SignatureVerificationStatus::Suspect
        };
        Ok(VerificationResult::new(INTEGRITY_PROVIDER, trust, issues))
    }
}
