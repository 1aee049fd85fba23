// verifier.rs — Package signature verification orchestrator
//
// Reads the primary signature once, reports unsigned packages and illegal
// signature combinations itself, then runs the providers: gates first (an
// error from a gate skips the rest), the remainder concurrently. The package
// is valid when at least one result exists and none carries an error.

use futures::future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::VerifyError;
use crate::package::PackageReader;
use crate::verify::provider::VerificationProvider;
use crate::verify::result::{
    AggregateResult, IssueCode, IssueLevel, SignatureVerificationStatus, VerificationResult,
};
use crate::verify::settings::PolicySettings;
use crate::verify::severity::{self, Concern};

/// Provider name of results produced by the orchestrator itself.
pub const PACKAGE_PROVIDER: &str = "package";

const NOT_SIGNED: &str =
    "The package is not signed. Unable to verify signature from an unsigned package.";
const ILLEGAL_COMBINATION: &str =
    "A repository primary signature must not have a repository countersignature.";

pub struct PackageSignatureVerifier {
    providers: Vec<Arc<dyn VerificationProvider>>,
}

impl PackageSignatureVerifier {
    /// # Errors
    ///
    /// Returns [`VerifyError::NoProviders`] when `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn VerificationProvider>>) -> Result<Self, VerifyError> {
        if providers.is_empty() {
            return Err(VerifyError::NoProviders);
        }
        Ok(Self { providers })
    }

    pub fn providers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|p| p.name())
    }

    /// Verify `package` under `settings`.
    ///
    /// # Errors
    ///
    /// Structural problems with the signature entry, unsupported inputs and
    /// cancellation. Policy failures are reported in the result.
    pub async fn verify(
        &self,
        package: &dyn PackageReader,
        settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, VerifyError> {
        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }
        let identity = package.identity();

        let Some(signature) = package.primary_signature()? else {
            let results = match severity::issue(
                settings,
                Concern::Unsigned,
                IssueCode::PackageNotSigned,
                NOT_SIGNED,
            ) {
                Some(issue) => vec![VerificationResult::new(
                    PACKAGE_PROVIDER,
                    SignatureVerificationStatus::Disallowed,
                    vec![issue],
                )],
                None => Vec::new(),
            };
            let is_valid = results.is_empty();
            info!(package = %identity, is_valid, "package is not signed");
            return Ok(AggregateResult { is_valid, results });
        };

        let mut results = Vec::new();
        if signature.has_illegal_combination() {
            if let Some(issue) = severity::issue(
                settings,
                Concern::IllegalCombination,
                IssueCode::IllegalSignatureCombination,
                ILLEGAL_COMBINATION,
            ) {
                let trust = if issue.level == IssueLevel::Error {
                    SignatureVerificationStatus::Disallowed
                } else {
                    SignatureVerificationStatus::Valid
                };
                results.push(VerificationResult::new(PACKAGE_PROVIDER, trust, vec![issue]));
            }
        }

        let (gates, rest): (Vec<_>, Vec<_>) = self.providers.iter().partition(|p| p.is_gate());

        let mut gate_failed = false;
        for provider in gates {
            if cancel.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            let result = provider.verify(package, &signature, settings, cancel).await?;
            debug!(provider = provider.name(), trust = ?result.trust, "provider finished");
            gate_failed |= result.has_errors();
            results.push(result);
            if gate_failed {
                break;
            }
        }

        if !gate_failed {
            let outcomes = future::join_all(
                rest.iter()
                    .map(|provider| provider.verify(package, &signature, settings, cancel)),
            )
            .await;
            for (provider, outcome) in rest.iter().zip(outcomes) {
                let result = outcome?;
                debug!(provider = provider.name(), trust = ?result.trust, "provider finished");
                results.push(result);
            }
        }

        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }

        let is_valid = !results.is_empty() && !results.iter().any(VerificationResult::has_errors);
        info!(
            package = %identity,
            signer = %signature.signature.describe(),
            is_valid,
            errors = results.iter().flat_map(|r| r.errors()).count(),
            warnings = results.iter().flat_map(|r| r.warnings()).count(),
            "verified package signature"
        );
        Ok(AggregateResult { is_valid, results })
    }
}
