use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::pki::chain::{self, CertificateChain};
use crate::pki::revocation::{InMemoryRevocationList, RevocationSource, RevocationStatus};
use crate::signature::Certificate;

/// Default bound on a single revocation lookup.
pub const DEFAULT_REVOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Chain building and revocation capabilities the trust verifier relies on.
#[async_trait]
pub trait CertificatePlatform: Send + Sync {
    fn build_chain(&self, leaf: &Certificate, additional: &[Certificate]) -> CertificateChain;

    /// Revocation status of `certificate`. A lookup that fails or times out
    /// yields [`RevocationStatus::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Cancelled`] if `cancel` fires first.
    async fn check_revocation(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        cancel: &CancellationToken,
    ) -> Result<RevocationStatus, VerifyError>;
}

/// A [`CertificatePlatform`] backed by an explicit trusted root set and a
/// [`RevocationSource`].
#[derive(Clone)]
pub struct SoftwarePlatform {
    trusted_roots: Vec<Certificate>,
    revocation: Arc<dyn RevocationSource>,
    revocation_timeout: Duration,
}

impl fmt::Debug for SoftwarePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwarePlatform")
            .field("trusted_roots", &self.trusted_roots.len())
            .field("revocation_timeout", &self.revocation_timeout)
            .finish_non_exhaustive()
    }
}

impl SoftwarePlatform {
    pub fn new(trusted_roots: Vec<Certificate>) -> Self {
        Self {
            trusted_roots,
            revocation: Arc::new(InMemoryRevocationList::new()),
            revocation_timeout: DEFAULT_REVOCATION_TIMEOUT,
        }
    }

    pub fn with_revocation_source(mut self, source: Arc<dyn RevocationSource>) -> Self {
        self.revocation = source;
        self
    }

    pub fn with_revocation_timeout(mut self, timeout: Duration) -> Self {
        self.revocation_timeout = timeout;
        self
    }

    pub fn trusted_roots(&self) -> &[Certificate] {
        &self.trusted_roots
    }
}

#[async_trait]
impl CertificatePlatform for SoftwarePlatform {
    fn build_chain(&self, leaf: &Certificate, additional: &[Certificate]) -> CertificateChain {
        chain::build_chain(leaf, additional, &self.trusted_roots)
    }

    async fn check_revocation(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        cancel: &CancellationToken,
    ) -> Result<RevocationStatus, VerifyError> {
        let lookup = tokio::time::timeout(
            self.revocation_timeout,
            self.revocation.status(certificate, issuer),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VerifyError::Cancelled),
            outcome = lookup => match outcome {
                Ok(Ok(status)) => {
                    debug!(subject = certificate.subject(), ?status, "revocation status");
                    Ok(status)
                }
                Ok(Err(e)) => {
                    warn!(subject = certificate.subject(), error = %e, "revocation lookup failed");
                    Ok(RevocationStatus::Unknown(e.to_string()))
                }
                Err(_) => {
                    warn!(
                        subject = certificate.subject(),
                        timeout_ms = self.revocation_timeout.as_millis() as u64,
                        "revocation lookup timed out"
                    );
                    Ok(RevocationStatus::Unknown(format!(
                        "the revocation lookup timed out after {} ms",
                        self.revocation_timeout.as_millis()
                    )))
                }
            },
        }
    }
}
