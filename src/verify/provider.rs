use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::VerifyError;
use crate::package::PackageReader;
use crate::signature::PrimarySignature;
use crate::verify::result::VerificationResult;
use crate::verify::settings::PolicySettings;

/// An independent check over a signed package.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    /// Stable provider name reported in [`VerificationResult::provider`].
    fn name(&self) -> &'static str;

    /// Gate providers run before the others; an error from a gate skips
    /// the remaining providers.
    fn is_gate(&self) -> bool {
        false
    }

    /// # Errors
    ///
    /// Only structural problems, unsupported inputs and cancellation are
    /// errors; policy outcomes are reported as issues.
    async fn verify(
        &self,
        package: &dyn PackageReader,
        signature: &PrimarySignature,
        settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, VerifyError>;
}
