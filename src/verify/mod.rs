// verify/ — Package signature verification
//
// settings.rs   — Policy toggles, presets, allow-list entries
// result.rs     — Trust statuses, issues, per-provider and aggregate results
// severity.rs   — How each policy flag sets the level of the issue it governs
// provider.rs   — The provider trait
// integrity.rs  — Signature value and content hash
// trust.rs      — Chain, validity, timestamps, revocation, countersignatures
// allow_list.rs — Trusted signer fingerprints
// verifier.rs   — Orchestrator

pub mod allow_list;
pub mod integrity;
pub mod provider;
pub mod result;
pub mod settings;
pub(crate) mod severity;
pub mod trust;
pub mod verifier;

pub use allow_list::{AllowListVerifier, ALLOW_LIST_PROVIDER};
pub use integrity::{IntegrityVerifier, INTEGRITY_PROVIDER};
pub use provider::VerificationProvider;
pub use result::{
    AggregateResult, IssueCode, IssueLevel, SignatureIssue, SignatureVerificationStatus,
    VerificationResult,
};
pub use settings::{
    AllowListEntry, CountersignatureBehavior, PolicySettings, RevocationMode, SignaturePlacement,
    VerificationTarget,
};
pub use trust::{SignatureEvaluation, TrustVerifier, TRUST_PROVIDER};
pub use verifier::{PackageSignatureVerifier, PACKAGE_PROVIDER};
