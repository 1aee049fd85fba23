use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse-grained trust verdict of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureVerificationStatus {
    /// The provider did not apply.
    Unknown,
    Valid,
    Untrusted,
    /// Once valid, but later found compromised (for example revoked).
    Suspect,
    Disallowed,
}

impl SignatureVerificationStatus {
    /// Position in the trust order, least trusted first. `Unknown` has none.
    fn rank(self) -> Option<u8> {
        match self {
            SignatureVerificationStatus::Suspect => Some(0),
            SignatureVerificationStatus::Disallowed => Some(1),
            SignatureVerificationStatus::Untrusted => Some(2),
            SignatureVerificationStatus::Valid => Some(3),
            SignatureVerificationStatus::Unknown => None,
        }
    }

    /// The less trusted of two statuses; `Unknown` never wins against an
    /// applicable status.
    pub fn least_trusted(self, other: Self) -> Self {
        match (self.rank(), other.rank()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) if b < a => other,
            _ => self,
        }
    }
}

/// Stable machine-readable issue identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    PackageNotSigned,
    PackageIntegrityCheckFailed,
    SignatureInvalid,
    UntrustedRoot,
    CertificateChainInvalid,
    CertificateNotValidForPurpose,
    CertificateNotYetValid,
    CertificateExpired,
    CertificateRevoked,
    RevocationCheckUnreachable,
    TimestampRequired,
    MultipleTimestampsNotAllowed,
    TimestampIntegrityCheckFailed,
    TimestampOutsideTsaValidity,
    TimestampUntrusted,
    TimestampInvalid,
    CountersignatureRequired,
    IllegalSignatureCombination,
    NoAllowList,
    NoMatchInAllowList,
    SignatureSummary,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug of a fieldless enum is its variant name.
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueLevel {
    Error,
    Warning,
    Information,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureIssue {
    pub code: IssueCode,
    pub level: IssueLevel,
    pub message: String,
}

impl SignatureIssue {
    pub fn new(code: IssueCode, level: IssueLevel, message: impl Into<String>) -> Self {
        Self {
            code,
            level,
            message: message.into(),
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(code, IssueLevel::Error, message)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(code, IssueLevel::Warning, message)
    }

    pub fn information(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(code, IssueLevel::Information, message)
    }
}

/// Result of one provider for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub provider: String,
    pub trust: SignatureVerificationStatus,
    pub issues: Vec<SignatureIssue>,
}

impl VerificationResult {
    pub fn new(
        provider: impl Into<String>,
        trust: SignatureVerificationStatus,
        issues: Vec<SignatureIssue>,
    ) -> Self {
        Self {
            provider: provider.into(),
            trust,
            issues,
        }
    }

    pub fn issues_at(&self, level: IssueLevel) -> impl Iterator<Item = &SignatureIssue> {
        self.issues.iter().filter(move |i| i.level == level)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SignatureIssue> {
        self.issues_at(IssueLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SignatureIssue> {
        self.issues_at(IssueLevel::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Overall verdict for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub is_valid: bool,
    pub results: Vec<VerificationResult>,
}

impl AggregateResult {
    pub fn errors(&self) -> impl Iterator<Item = &SignatureIssue> {
        self.results.iter().flat_map(VerificationResult::errors)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SignatureIssue> {
        self.results.iter().flat_map(VerificationResult::warnings)
    }

    pub fn result(&self, provider: &str) -> Option<&VerificationResult> {
        self.results.iter().find(|r| r.provider == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SignatureVerificationStatus::*;

    #[test]
    fn least_trusted_follows_trust_order() {
        assert_eq!(Valid.least_trusted(Untrusted), Untrusted);
        assert_eq!(Untrusted.least_trusted(Disallowed), Disallowed);
        assert_eq!(Disallowed.least_trusted(Suspect), Suspect);
        assert_eq!(Suspect.least_trusted(Valid), Suspect);
    }

    #[test]
    fn unknown_never_wins() {
        assert_eq!(Unknown.least_trusted(Valid), Valid);
        assert_eq!(Suspect.least_trusted(Unknown), Suspect);
        assert_eq!(Unknown.least_trusted(Unknown), Unknown);
    }

    #[test]
    fn issue_codes_serialize_snake_case() {
        let json = serde_json::to_string(&IssueCode::NoMatchInAllowList).unwrap();
        assert_eq!(json, "\"no_match_in_allow_list\"");
        assert_eq!(IssueCode::TimestampRequired.to_string(), "TimestampRequired");
    }

    #[test]
    fn result_filters_by_level() {
        let result = VerificationResult::new(
            "trust",
            Valid,
            vec![
                SignatureIssue::warning(IssueCode::UntrustedRoot, "w"),
                SignatureIssue::information(IssueCode::RevocationCheckUnreachable, "i"),
            ],
        );
        assert!(!result.has_errors());
        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.issues_at(IssueLevel::Information).count(), 1);
    }
}
