// trust.rs — Trust chain, validity, timestamp and revocation provider
//
// Each applicable signature is evaluated on its own (chain to a trusted
// root, validity now or at a verified timestamp, revocation of every chain
// link), then the primary and countersignature verdicts are combined under
// the configured countersignature behavior. All issues are collected; an
// allow-flag downgrades its issue to a warning instead of stopping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::package::PackageReader;
use crate::pki::{CertificateChain, CertificatePlatform, ChainStatus, RevocationStatus};
use crate::signature::{Certificate, KeyPurpose, PrimarySignature, Signature, Timestamp};
use crate::verify::provider::VerificationProvider;
use crate::verify::result::{
    IssueCode, IssueLevel, SignatureIssue, SignatureVerificationStatus, VerificationResult,
};
use crate::verify::settings::{CountersignatureBehavior, PolicySettings};
use crate::verify::severity::{self, Concern};

pub const TRUST_PROVIDER: &str = "trust";

const COUNTERSIGNATURE_REQUIRED: &str = "Verification settings require a repository countersignature, but the package does not have a repository countersignature.";

/// What made a signature less than valid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Findings {
    untrusted: bool,
    expired: bool,
    not_yet_valid: bool,
    illegal: bool,
    suspect: bool,
}

#[derive(Debug, Clone, Copy)]
enum Finding {
    Untrusted,
    Expired,
    /// Not superseded by a countersignature: the certificate was never
    /// valid when the signature was made.
    NotYetValid,
    Illegal,
    Suspect,
}

/// A certificate judged outside its validity period.
#[derive(Debug, Clone, Copy)]
enum ValidityProblem {
    NotYetValid,
    Expired,
}

impl ValidityProblem {
    /// Check `certificate` over `[earliest, latest]`.
    fn of(
        certificate: &Certificate,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    ) -> Option<Self> {
        if earliest < certificate.body.not_before {
            Some(ValidityProblem::NotYetValid)
        } else if latest >= certificate.body.not_after {
            Some(ValidityProblem::Expired)
        } else {
            None
        }
    }

    fn code(self) -> IssueCode {
        match self {
            ValidityProblem::NotYetValid => IssueCode::CertificateNotYetValid,
            ValidityProblem::Expired => IssueCode::CertificateExpired,
        }
    }

    fn finding(self) -> Finding {
        match self {
            ValidityProblem::NotYetValid => Finding::NotYetValid,
            ValidityProblem::Expired => Finding::Expired,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ValidityProblem::NotYetValid => "is not yet valid",
            ValidityProblem::Expired => "has expired",
        }
    }
}

/// Trust verdict for a single signature.
#[derive(Debug, Clone)]
pub struct SignatureEvaluation {
    pub status: SignatureVerificationStatus,
    pub issues: Vec<SignatureIssue>,
    /// Signing time asserted by the accepted timestamp, if any.
    pub timestamp_time: Option<DateTime<Utc>>,
    findings: Findings,
}

impl SignatureEvaluation {
    /// Failed only because of an untrusted root and/or expiry, which a
    /// valid countersignature may supersede.
    fn is_supersedable(&self) -> bool {
        self.status != SignatureVerificationStatus::Valid
            && (self.findings.untrusted || self.findings.expired)
            && !self.findings.not_yet_valid
            && !self.findings.illegal
            && !self.findings.suspect
    }
}

#[derive(Default)]
struct Accumulator {
    issues: Vec<SignatureIssue>,
    findings: Findings,
}

impl Accumulator {
    fn push(&mut self, issue: SignatureIssue, finding: Finding) {
        if issue.level == IssueLevel::Error {
            match finding {
                Finding::Untrusted => self.findings.untrusted = true,
                Finding::Expired => self.findings.expired = true,
                Finding::NotYetValid => self.findings.not_yet_valid = true,
                Finding::Illegal => self.findings.illegal = true,
                Finding::Suspect => self.findings.suspect = true,
            }
        }
        self.issues.push(issue);
    }

    fn concern(
        &mut self,
        settings: &PolicySettings,
        concern: Concern,
        code: IssueCode,
        message: String,
        finding: Finding,
    ) {
        if let Some(issue) = severity::issue(settings, concern, code, message) {
            self.push(issue, finding);
        }
    }

    fn finish(self, timestamp_time: Option<DateTime<Utc>>) -> SignatureEvaluation {
        let f = self.findings;
        let status = if f.suspect {
            SignatureVerificationStatus::Suspect
        } else if f.illegal || f.expired || f.not_yet_valid {
            SignatureVerificationStatus::Disallowed
        } else if f.untrusted {
            SignatureVerificationStatus::Untrusted
        } else {
            SignatureVerificationStatus::Valid
        };
        SignatureEvaluation {
            status,
            issues: self.issues,
            timestamp_time,
            findings: f,
        }
    }
}

/// Evaluation parameters for one pass over a signature.
#[derive(Clone, Copy)]
struct Check<'a> {
    settings: &'a PolicySettings,
    now: DateTime<Utc>,
    /// Accept an untrusted signer root with a warning.
    tolerate_untrusted_root: bool,
    /// Judge signer validity at this instant instead of now or the timestamp.
    validity_at: Option<DateTime<Utc>>,
}

impl<'a> Check<'a> {
    fn new(settings: &'a PolicySettings) -> Self {
        Self {
            settings,
            now: Utc::now(),
            tolerate_untrusted_root: false,
            validity_at: None,
        }
    }
}

/// Problems found while verifying a timestamp.
#[derive(Default)]
struct TimestampCheck {
    /// Failures the policy may ignore (`allow_ignore_timestamp`).
    problems: Vec<(IssueCode, String)>,
    /// Generalized time outside the TSA validity period.
    outside_tsa_validity: Option<String>,
    unknown_revocation: Vec<String>,
    warnings: Vec<SignatureIssue>,
}

pub struct TrustVerifier {
    platform: Arc<dyn CertificatePlatform>,
}

impl TrustVerifier {
    pub fn new(platform: Arc<dyn CertificatePlatform>) -> Self {
        Self { platform }
    }

    /// Evaluate one signature on its own. `bound_digest` is the digest a
    /// countersignature must carry.
    pub async fn evaluate_signature(
        &self,
        signature: &Signature,
        bound_digest: Option<&str>,
        settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<SignatureEvaluation, VerifyError> {
        self.evaluate(signature, bound_digest, Check::new(settings), cancel)
            .await
    }

    async fn evaluate(
        &self,
        signature: &Signature,
        bound_digest: Option<&str>,
        check: Check<'_>,
        cancel: &CancellationToken,
    ) -> Result<SignatureEvaluation, VerifyError> {
        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }
        let settings = check.settings;
        let label = signature.describe();
        let certificate = &signature.signer_certificate;
        let mut acc = Accumulator::default();

        if let Some(expected) = bound_digest {
            if !signature.signed_digest.eq_ignore_ascii_case(expected)
                || !signature.verify_signature_value()?
            {
                acc.push(
                    SignatureIssue::error(
                        IssueCode::SignatureInvalid,
                        format!("The {label} is invalid or does not match the primary signature."),
                    ),
                    Finding::Suspect,
                );
            }
        }

        if !certificate.has_purpose(KeyPurpose::CodeSigning) {
            acc.concern(
                settings,
                Concern::CertificateNotAcceptable,
                IssueCode::CertificateNotValidForPurpose,
                format!("The signing certificate of the {label} is not valid for code signing."),
                Finding::Illegal,
            );
        }

        // Timestamp
        let mut signing_range = None;
        match signature.timestamps.as_slice() {
            [] => acc.concern(
                settings,
                Concern::MissingTimestamp,
                IssueCode::TimestampRequired,
                format!("The {label} does not have a timestamp."),
                Finding::Illegal,
            ),
            [timestamp, rest @ ..] => {
                if !rest.is_empty() {
                    acc.concern(
                        settings,
                        Concern::MultipleTimestamps,
                        IssueCode::MultipleTimestampsNotAllowed,
                        format!("The {label} contains multiple timestamps."),
                        Finding::Illegal,
                    );
                }

                let ts = self
                    .verify_timestamp(signature, timestamp, &check, cancel)
                    .await?;
                let accepted = ts.problems.is_empty() && ts.outside_tsa_validity.is_none();
                for (code, message) in ts.problems {
                    acc.concern(settings, Concern::InvalidTimestamp, code, message, Finding::Illegal);
                }
                if let Some(message) = ts.outside_tsa_validity {
                    acc.push(
                        SignatureIssue::error(IssueCode::TimestampOutsideTsaValidity, message),
                        Finding::Illegal,
                    );
                }
                for reason in ts.unknown_revocation {
                    acc.concern(
                        settings,
                        Concern::UnknownRevocation,
                        IssueCode::RevocationCheckUnreachable,
                        reason,
                        Finding::Illegal,
                    );
                }
                for warning in ts.warnings {
                    acc.push(warning, Finding::Untrusted);
                }
                if accepted {
                    signing_range = Some((timestamp.lower_limit(), timestamp.upper_limit()));
                }
            }
        }

        // Validity period
        let (earliest, latest) = match (check.validity_at, signing_range) {
            (Some(at), _) => (at, at),
            (None, Some(range)) => range,
            (None, None) => (check.now, check.now),
        };
        if let Some(problem) = ValidityProblem::of(certificate, earliest, latest) {
            acc.concern(
                settings,
                Concern::CertificateNotAcceptable,
                problem.code(),
                format!("The signing certificate of the {label} {}.", problem.describe()),
                problem.finding(),
            );
        }

        // Chain and revocation
        let chain = self
            .platform
            .build_chain(certificate, &signature.additional_certificates);
        match &chain.status {
            ChainStatus::Trusted => {}
            ChainStatus::UntrustedRoot | ChainStatus::PartialChain => {
                let message = if chain.status == ChainStatus::UntrustedRoot {
                    format!("The {label} chains to a root certificate that is not trusted.")
                } else {
                    format!("A certificate chain for the {label} could not be built to a trusted root.")
                };
                if is_allowed_untrusted_root(&chain, settings) {
                    acc.push(
                        SignatureIssue::warning(
                            IssueCode::UntrustedRoot,
                            format!("{message} The root is explicitly allowed."),
                        ),
                        Finding::Untrusted,
                    );
                } else if check.tolerate_untrusted_root {
                    acc.push(
                        SignatureIssue::warning(IssueCode::UntrustedRoot, message),
                        Finding::Untrusted,
                    );
                } else {
                    acc.concern(
                        settings,
                        Concern::UntrustedRoot,
                        IssueCode::UntrustedRoot,
                        message,
                        Finding::Untrusted,
                    );
                }
            }
            ChainStatus::Invalid(reason) => acc.push(
                SignatureIssue::error(
                    IssueCode::CertificateChainInvalid,
                    format!("The certificate chain of the {label} is invalid: {reason}"),
                ),
                Finding::Illegal,
            ),
        }

        // Issuers are held to the same instant or range as the signer.
        for issuer in chain.certificates.iter().skip(1) {
            if let Some(problem) = ValidityProblem::of(issuer, earliest, latest) {
                acc.concern(
                    settings,
                    Concern::CertificateNotAcceptable,
                    problem.code(),
                    format!(
                        "The issuing certificate '{}' in the chain of the {label} {}.",
                        issuer.subject(),
                        problem.describe()
                    ),
                    problem.finding(),
                );
            }
        }

        if !matches!(chain.status, ChainStatus::Invalid(_)) {
            for (subject, issuer) in chain.links() {
                match self.platform.check_revocation(subject, issuer, cancel).await? {
                    RevocationStatus::Good => {}
                    RevocationStatus::Revoked { revoked_at } if check.now > revoked_at => acc.push(
                        SignatureIssue::error(
                            IssueCode::CertificateRevoked,
                            format!(
                                "The certificate '{}' in the chain of the {label} has been revoked.",
                                subject.subject()
                            ),
                        ),
                        Finding::Suspect,
                    ),
                    RevocationStatus::Revoked { .. } => {}
                    RevocationStatus::Unknown(reason) => acc.concern(
                        settings,
                        Concern::UnknownRevocation,
                        IssueCode::RevocationCheckUnreachable,
                        format!(
                            "The revocation status of '{}' could not be determined: {reason}",
                            subject.subject()
                        ),
                        Finding::Illegal,
                    ),
                }
            }
        }

        let evaluation = acc.finish(signing_range.map(|_| signature.timestamps[0].generalized_time()));
        debug!(
            signature = %label,
            status = ?evaluation.status,
            issues = evaluation.issues.len(),
            "evaluated signature trust"
        );
        Ok(evaluation)
    }

    async fn verify_timestamp(
        &self,
        signature: &Signature,
        timestamp: &Timestamp,
        check: &Check<'_>,
        cancel: &CancellationToken,
    ) -> Result<TimestampCheck, VerifyError> {
        let mut out = TimestampCheck::default();
        let tsa = &timestamp.tsa_certificate;
        let token = &timestamp.token;

        let imprint = hash::hex_encode(&token.hash_algorithm.digest(signature.signature_value.as_bytes()));
        if !token.message_imprint.eq_ignore_ascii_case(&imprint) {
            out.problems.push((
                IssueCode::TimestampIntegrityCheckFailed,
                "The timestamp does not match the signature it timestamps.".to_string(),
            ));
        }
        if !tsa.verify_signed(&timestamp.signed_bytes()?, &timestamp.signature_value) {
            out.problems.push((
                IssueCode::TimestampIntegrityCheckFailed,
                "The timestamp signature is invalid.".to_string(),
            ));
        }
        if !tsa.has_purpose(KeyPurpose::TimeStamping) {
            out.problems.push((
                IssueCode::CertificateNotValidForPurpose,
                "The timestamp authority certificate is not valid for time stamping.".to_string(),
            ));
        }
        // An expired TSA certificate is fine as long as it was valid when
        // the timestamp was produced.
        if !tsa.is_valid_at(token.generalized_time) {
            out.outside_tsa_validity = Some(
                "The timestamp's generalized time is outside the timestamp authority certificate's validity period."
                    .to_string(),
            );
        }

        let chain = self
            .platform
            .build_chain(tsa, &timestamp.additional_certificates);
        match &chain.status {
            ChainStatus::Trusted => {}
            ChainStatus::UntrustedRoot | ChainStatus::PartialChain => {
                if is_allowed_untrusted_root(&chain, check.settings) {
                    out.warnings.push(SignatureIssue::warning(
                        IssueCode::TimestampUntrusted,
                        "The timestamp authority chains to an untrusted root that is explicitly allowed.",
                    ));
                } else {
                    out.problems.push((
                        IssueCode::TimestampUntrusted,
                        "The timestamp authority certificate chains to a root certificate that is not trusted.".to_string(),
                    ));
                }
            }
            ChainStatus::Invalid(reason) => {
                out.problems.push((
                    IssueCode::TimestampInvalid,
                    format!("The timestamp authority certificate chain is invalid: {reason}"),
                ));
                return Ok(out);
            }
        }

        for issuer in chain.certificates.iter().skip(1) {
            if !issuer.is_valid_at(token.generalized_time) {
                out.problems.push((
                    IssueCode::TimestampInvalid,
                    format!(
                        "The timestamp authority's issuing certificate '{}' was not valid at the timestamp's generalized time.",
                        issuer.subject()
                    ),
                ));
            }
        }

        for (subject, issuer) in chain.links() {
            match self.platform.check_revocation(subject, issuer, cancel).await? {
                RevocationStatus::Good => {}
                RevocationStatus::Revoked { revoked_at } if check.now > revoked_at => {
                    out.problems.push((
                        IssueCode::TimestampInvalid,
                        format!(
                            "The timestamp authority certificate '{}' has been revoked.",
                            subject.subject()
                        ),
                    ));
                }
                RevocationStatus::Revoked { .. } => {}
                RevocationStatus::Unknown(reason) => out.unknown_revocation.push(format!(
                    "The revocation status of the timestamp authority certificate '{}' could not be determined: {reason}",
                    subject.subject()
                )),
            }
        }
        Ok(out)
    }
}

fn is_allowed_untrusted_root(chain: &CertificateChain, settings: &PolicySettings) -> bool {
    if chain.status != ChainStatus::UntrustedRoot || settings.allowed_untrusted_roots.is_empty() {
        return false;
    }
    chain
        .root()
        .and_then(|root| root.fingerprint(HashAlgorithm::Sha256).ok())
        .map(|fp| {
            settings
                .allowed_untrusted_roots
                .iter()
                .any(|allowed| hash::fingerprints_match(allowed, &fp))
        })
        .unwrap_or(false)
}

#[async_trait]
impl VerificationProvider for TrustVerifier {
    fn name(&self) -> &'static str {
        TRUST_PROVIDER
    }

    async fn verify(
        &self,
        _package: &dyn PackageReader,
        signature: &PrimarySignature,
        settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, VerifyError> {
        let check = Check::new(settings);
        let primary = &signature.signature;

        let primary_eval = if settings.applies_to(primary) {
            Some(self.evaluate(primary, None, check, cancel).await?)
        } else {
            None
        };

        // A countersignature on a repository primary is an illegal
        // combination reported by the orchestrator; it is not evaluated.
        let countersignature = signature
            .countersignature
            .as_ref()
            .filter(|_| !signature.has_illegal_combination());

        let mut issues = Vec::new();
        if settings.countersignature_behavior == CountersignatureBehavior::Always
            && countersignature.is_none()
        {
            let mut trust = SignatureVerificationStatus::Disallowed;
            if let Some(p) = primary_eval {
                trust = p.status.least_trusted(trust);
                issues.extend(p.issues);
            }
            issues.push(SignatureIssue::error(
                IssueCode::CountersignatureRequired,
                COUNTERSIGNATURE_REQUIRED,
            ));
            return Ok(VerificationResult::new(TRUST_PROVIDER, trust, issues));
        }

        let evaluate_countersignature = countersignature
            .filter(|c| settings.applies_to(c))
            .filter(|_| match settings.countersignature_behavior {
                CountersignatureBehavior::Never => false,
                CountersignatureBehavior::IfExists | CountersignatureBehavior::Always => true,
                CountersignatureBehavior::IfExistsAndIsNecessary => primary_eval
                    .as_ref()
                    .map_or(true, |p| p.status != SignatureVerificationStatus::Valid),
            });

        let counter_eval = match evaluate_countersignature {
            Some(counter) => {
                let bound = primary.countersignature_digest(counter.digest_algorithm);
                Some(self.evaluate(counter, Some(&bound), check, cancel).await?)
            }
            None => None,
        };

        let trust = match (primary_eval, counter_eval) {
            (Some(p), Some(c)) => {
                let mut superseded = None;
                if c.status == SignatureVerificationStatus::Valid && p.is_supersedable() {
                    // Judge the primary as it stood when the repository
                    // countersigned it.
                    let relaxed = Check {
                        tolerate_untrusted_root: true,
                        validity_at: Some(c.timestamp_time.unwrap_or(check.now)),
                        ..check
                    };
                    let re = self.evaluate(primary, None, relaxed, cancel).await?;
                    if re.status == SignatureVerificationStatus::Valid {
                        debug!("countersignature supersedes primary signature verdict");
                        superseded = Some(re);
                    }
                }

                match superseded {
                    Some(re) => {
                        issues.extend(re.issues);
                        issues.extend(c.issues);
                        SignatureVerificationStatus::Valid
                    }
                    None => {
                        let trust = p.status.least_trusted(c.status);
                        issues.extend(p.issues);
                        issues.extend(c.issues);
                        trust
                    }
                }
            }
            (Some(only), None) | (None, Some(only)) => {
                issues.extend(only.issues);
                only.status
            }
            (None, None) => SignatureVerificationStatus::Unknown,
        };

        Ok(VerificationResult::new(TRUST_PROVIDER, trust, issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::{CertificateRequest, InMemoryRevocationList, RevocationMode};
    use crate::signature::SignatureBuilder;
    use crate::testing::{days_ago, days_from_now, memory_package, Fixture};
    use crate::verify::settings::VerificationTarget;

    async fn trust_of(
        verifier: &TrustVerifier,
        signature: &PrimarySignature,
        settings: &PolicySettings,
    ) -> VerificationResult {
        verifier
            .verify(&memory_package(), signature, settings, &CancellationToken::new())
            .await
            .unwrap()
    }

    fn codes(result: &VerificationResult, level: IssueLevel) -> Vec<IssueCode> {
        result.issues_at(level).map(|i| i.code).collect()
    }

    #[tokio::test]
    async fn trusted_timestamped_signature_is_valid() {
        let fx = Fixture::new();
        let signature = fx.sign_author_timestamped(&memory_package());

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert!(!result.has_errors(), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn untrusted_root_is_untrusted() {
        let fx = Fixture::new();
        let signature = fx.sign_with(&fx.untrusted_author, &memory_package(), None);
        let verifier = fx.trust_verifier();

        let result = trust_of(&verifier, &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Untrusted);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::UntrustedRoot]);

        let lenient = PolicySettings {
            allow_untrusted: true,
            ..PolicySettings::verify_command()
        };
        let result = trust_of(&verifier, &signature, &lenient).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert_eq!(codes(&result, IssueLevel::Warning), vec![IssueCode::UntrustedRoot]);
    }

    #[tokio::test]
    async fn allowed_untrusted_root_is_a_warning() {
        let fx = Fixture::new();
        let signature = fx.sign_with(&fx.untrusted_author, &memory_package(), None);
        let settings = PolicySettings {
            allowed_untrusted_roots: vec![fx
                .untrusted_root
                .certificate()
                .fingerprint(HashAlgorithm::Sha256)
                .unwrap()
                .to_ascii_lowercase()],
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert_eq!(codes(&result, IssueLevel::Warning), vec![IssueCode::UntrustedRoot]);
    }

    #[tokio::test]
    async fn expired_without_timestamp_is_disallowed() {
        let fx = Fixture::new();
        let signer = fx.issue(
            CertificateRequest::code_signing("CN=Expired").valid_between(days_ago(30), days_ago(1)),
        );
        let signature = fx.sign_with(&signer, &memory_package(), None);

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::CertificateExpired]);
    }

    #[tokio::test]
    async fn timestamp_shifts_validity_of_expired_certificate() {
        let fx = Fixture::new();
        let signer = fx.issue(
            CertificateRequest::code_signing("CN=Expired").valid_between(days_ago(30), days_ago(1)),
        );
        let tsa = fx.tsa_at(days_ago(10));
        let signature = fx.sign_with(&signer, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert!(!result.has_errors(), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn timestamp_accuracy_must_fit_inside_validity() {
        let fx = Fixture::new();
        let not_after = days_ago(1);
        let signer = fx.issue(
            CertificateRequest::code_signing("CN=Edge").valid_between(days_ago(30), not_after),
        );
        let tsa = fx
            .tsa_at(not_after - chrono::Duration::seconds(10))
            .with_accuracy(60);
        let signature = fx.sign_with(&signer, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::CertificateExpired]);
    }

    #[tokio::test]
    async fn expired_intermediate_is_disallowed() {
        let fx = Fixture::new();
        let intermediate = fx.intermediate_between(days_ago(60), days_ago(30));
        let signer = intermediate
            .issue(CertificateRequest::code_signing("CN=Late Author"))
            .unwrap();
        let signature = fx.sign_with(&signer, &memory_package(), None);

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::CertificateExpired]);
    }

    #[tokio::test]
    async fn intermediate_valid_at_timestamp_time_is_accepted() {
        let fx = Fixture::new();
        let intermediate = fx.intermediate_between(days_ago(60), days_ago(5));
        let signer = intermediate
            .issue(
                CertificateRequest::code_signing("CN=Author")
                    .valid_between(days_ago(50), days_from_now(300)),
            )
            .unwrap();
        let tsa = fx.tsa_at(days_ago(10));
        let signature = fx.sign_with(&signer, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn timestamp_authority_issuer_must_be_valid_at_generalized_time() {
        let fx = Fixture::new();
        let intermediate = fx.intermediate_between(days_ago(60), days_ago(20));
        let tsa_key = intermediate
            .issue(
                CertificateRequest::time_stamping("CN=Orphaned TSA")
                    .valid_between(days_ago(50), days_from_now(100)),
            )
            .unwrap();
        let tsa = crate::pki::TimestampAuthority::new(tsa_key).at_time(days_ago(10));
        let signature = fx.sign_with(&fx.author, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::TimestampInvalid]);
    }

    #[tokio::test]
    async fn revoked_signer_is_suspect_even_when_everything_is_allowed() {
        let fx = Fixture::new();
        let signature = fx.sign_author_timestamped(&memory_package());
        let mut list = InMemoryRevocationList::new();
        list.revoke(fx.author.certificate.serial_number(), days_ago(1));
        let verifier = fx.trust_verifier_with(list);

        for settings in [PolicySettings::accept(), PolicySettings::verify_command()] {
            let result = trust_of(&verifier, &signature, &settings).await;
            assert_eq!(result.trust, SignatureVerificationStatus::Suspect);
            assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::CertificateRevoked]);
        }
    }

    #[tokio::test]
    async fn future_revocation_is_not_yet_effective() {
        let fx = Fixture::new();
        let signature = fx.sign_author_timestamped(&memory_package());
        let mut list = InMemoryRevocationList::new();
        list.revoke(fx.author.certificate.serial_number(), days_from_now(1));

        let result = trust_of(
            &fx.trust_verifier_with(list),
            &signature,
            &PolicySettings::verify_command(),
        )
        .await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
    }

    #[tokio::test]
    async fn revoked_timestamp_authority_depends_on_ignore_timestamp() {
        let fx = Fixture::new();
        let signature = fx.sign_author_timestamped(&memory_package());
        let mut list = InMemoryRevocationList::new();
        list.revoke(fx.tsa.certificate().serial_number(), days_ago(1));
        let verifier = fx.trust_verifier_with(list);

        let result = trust_of(&verifier, &signature, &PolicySettings::require()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert_eq!(codes(&result, IssueLevel::Warning), vec![IssueCode::TimestampInvalid]);

        let result = trust_of(&verifier, &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::TimestampInvalid]);
    }

    #[tokio::test]
    async fn untrusted_timestamp_authority_is_an_error_unless_ignored() {
        let fx = Fixture::new();
        let foreign_tsa = fx.untrusted_tsa();
        let signature = fx.sign_with(&fx.author, &memory_package(), Some(&foreign_tsa));
        let verifier = fx.trust_verifier();

        let result = trust_of(&verifier, &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::TimestampUntrusted]);

        let result = trust_of(&verifier, &signature, &PolicySettings::require()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
    }

    #[tokio::test]
    async fn expired_tsa_certificate_is_judged_at_generalized_time() {
        let fx = Fixture::new();
        let tsa_key = fx.issue(
            CertificateRequest::time_stamping("CN=Old TSA").valid_between(days_ago(60), days_ago(5)),
        );
        let tsa = crate::pki::TimestampAuthority::new(tsa_key).at_time(days_ago(10));
        let signature = fx.sign_with(&fx.author, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn generalized_time_outside_tsa_validity_is_a_hard_error() {
        let fx = Fixture::new();
        let tsa_key = fx.issue(
            CertificateRequest::time_stamping("CN=Young TSA").valid_between(days_ago(2), days_from_now(30)),
        );
        let tsa = crate::pki::TimestampAuthority::new(tsa_key).at_time(days_ago(10));
        let signature = fx.sign_with(&fx.author, &memory_package(), Some(&tsa));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::accept()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(
            codes(&result, IssueLevel::Error),
            vec![IssueCode::TimestampOutsideTsaValidity]
        );
    }

    #[tokio::test]
    async fn missing_timestamp_when_required() {
        let fx = Fixture::new();
        let signature = fx.sign_author(&memory_package());
        let settings = PolicySettings {
            allow_no_timestamp: false,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::TimestampRequired]);
    }

    #[tokio::test]
    async fn multiple_timestamps_are_rejected_by_strict_policy() {
        let fx = Fixture::new();
        let mut signature = fx.sign_author_timestamped(&memory_package());
        let second = fx.tsa.timestamp(&signature.signature.signature_value).unwrap();
        signature.signature.timestamps.push(second);
        let verifier = fx.trust_verifier();

        let result = trust_of(&verifier, &signature, &PolicySettings::verify_command()).await;
        assert_eq!(
            codes(&result, IssueLevel::Error),
            vec![IssueCode::MultipleTimestampsNotAllowed]
        );

        let result = trust_of(&verifier, &signature, &PolicySettings::require()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
    }

    #[tokio::test]
    async fn unknown_revocation_levels_follow_policy() {
        let fx = Fixture::new();
        let signature = fx.sign_author(&memory_package());
        let mut list = InMemoryRevocationList::new();
        list.set_unreachable(true);
        let verifier = fx.trust_verifier_with(list);

        let online = PolicySettings {
            revocation_mode: RevocationMode::Online,
            ..PolicySettings::verify_command()
        };
        let result = trust_of(&verifier, &signature, &online).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert_eq!(
            codes(&result, IssueLevel::Warning),
            vec![IssueCode::RevocationCheckUnreachable]
        );

        let strict = PolicySettings {
            allow_unknown_revocation: false,
            ..online.clone()
        };
        let result = trust_of(&verifier, &signature, &strict).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert_eq!(
            codes(&result, IssueLevel::Error),
            vec![IssueCode::RevocationCheckUnreachable]
        );

        let offline = PolicySettings {
            revocation_mode: RevocationMode::Offline,
            ..strict
        };
        let result = trust_of(&verifier, &signature, &offline).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert_eq!(
            codes(&result, IssueLevel::Information),
            vec![IssueCode::RevocationCheckUnreachable]
        );
    }

    #[tokio::test]
    async fn always_requires_a_countersignature() {
        let fx = Fixture::new();
        let signature = fx.sign_repository_timestamped(&memory_package(), None);
        let settings = PolicySettings {
            verification_target: VerificationTarget::REPOSITORY,
            countersignature_behavior: CountersignatureBehavior::Always,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, IssueCode::CountersignatureRequired);
        assert_eq!(errors[0].message, COUNTERSIGNATURE_REQUIRED);
    }

    #[tokio::test]
    async fn missing_countersignature_keeps_revoked_primary_suspect() {
        let fx = Fixture::new();
        let signature = fx.sign_author_timestamped(&memory_package());
        let mut list = InMemoryRevocationList::new();
        list.revoke(fx.author.certificate.serial_number(), days_ago(1));
        let settings = PolicySettings {
            countersignature_behavior: CountersignatureBehavior::Always,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier_with(list), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Suspect);
        assert_eq!(
            codes(&result, IssueLevel::Error),
            vec![IssueCode::CertificateRevoked, IssueCode::CountersignatureRequired]
        );
    }

    #[tokio::test]
    async fn countersignature_supersedes_expired_untrusted_primary() {
        let fx = Fixture::new();
        let package = memory_package();
        let signer = fx.issue_untrusted(
            CertificateRequest::code_signing("CN=Lapsed").valid_between(days_ago(30), days_ago(1)),
        );
        let primary = fx.sign_with(&signer, &package, None);
        let signature = fx.countersign_at(primary, days_ago(5));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
        assert!(!result.has_errors(), "{:?}", result.issues);
        assert_eq!(codes(&result, IssueLevel::Warning), vec![IssueCode::UntrustedRoot]);
    }

    #[tokio::test]
    async fn countersignature_after_expiry_does_not_supersede() {
        let fx = Fixture::new();
        let signer = fx.issue_untrusted(
            CertificateRequest::code_signing("CN=Lapsed").valid_between(days_ago(30), days_ago(10)),
        );
        let primary = fx.sign_with(&signer, &memory_package(), None);
        let signature = fx.countersign_at(primary, days_ago(5));
        let settings = PolicySettings {
            countersignature_behavior: CountersignatureBehavior::IfExists,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert!(result.has_errors());
    }

    #[tokio::test]
    async fn countersignature_does_not_supersede_not_yet_valid_primary() {
        let fx = Fixture::new();
        let signer = fx.issue_untrusted(
            CertificateRequest::code_signing("CN=Early")
                .valid_between(days_from_now(1), days_from_now(30)),
        );
        let primary = fx.sign_with(&signer, &memory_package(), None);
        let signature = fx.countersign_at(primary, days_from_now(2));

        let result = trust_of(&fx.trust_verifier(), &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Disallowed);
        assert!(codes(&result, IssueLevel::Error).contains(&IssueCode::CertificateNotYetValid));
    }

    #[tokio::test]
    async fn necessary_behavior_skips_countersignature_of_valid_primary() {
        let fx = Fixture::new();
        let primary = fx.sign_author_timestamped(&memory_package());
        let metadata = fx.repository_metadata(None);
        let signature = SignatureBuilder::new(&fx.untrusted_repository)
            .countersign(&primary, metadata)
            .unwrap();
        let verifier = fx.trust_verifier();

        let result = trust_of(&verifier, &signature, &PolicySettings::verify_command()).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);

        let if_exists = PolicySettings {
            countersignature_behavior: CountersignatureBehavior::IfExists,
            ..PolicySettings::verify_command()
        };
        let result = trust_of(&verifier, &signature, &if_exists).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Untrusted);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::UntrustedRoot]);

        let never = PolicySettings {
            countersignature_behavior: CountersignatureBehavior::Never,
            ..if_exists
        };
        let result = trust_of(&verifier, &signature, &never).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Valid);
    }

    #[tokio::test]
    async fn countersignature_must_bind_primary() {
        let fx = Fixture::new();
        let package = memory_package();
        let countersigned = fx.countersign(fx.sign_author(&package));
        let mut swapped = fx.sign_with(&fx.untrusted_author, &package, None);
        swapped.countersignature = countersigned.countersignature;
        let settings = PolicySettings {
            countersignature_behavior: CountersignatureBehavior::IfExists,
            allow_untrusted: true,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &swapped, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Suspect);
        assert_eq!(codes(&result, IssueLevel::Error), vec![IssueCode::SignatureInvalid]);
    }

    #[tokio::test]
    async fn inapplicable_signature_is_unknown() {
        let fx = Fixture::new();
        let signature = fx.sign_author(&memory_package());
        let settings = PolicySettings {
            verification_target: VerificationTarget::REPOSITORY,
            ..PolicySettings::verify_command()
        };

        let result = trust_of(&fx.trust_verifier(), &signature, &settings).await;
        assert_eq!(result.trust, SignatureVerificationStatus::Unknown);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn cancellation_is_an_error() {
        let fx = Fixture::new();
        let signature = fx.sign_author(&memory_package());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fx
            .trust_verifier()
            .verify(&memory_package(), &signature, &PolicySettings::accept(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Cancelled));
    }
}
