// allow_list.rs — Trusted-signer allow list provider
//
// A package passes when any applicable signature's signer certificate
// fingerprint matches an entry whose target and placement overlap the
// signature's, subject to the entry's owner restriction.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::package::PackageReader;
use crate::signature::{PrimarySignature, Signature, Target};
use crate::verify::provider::VerificationProvider;
use crate::verify::result::{
    IssueCode, IssueLevel, SignatureIssue, SignatureVerificationStatus, VerificationResult,
};
use crate::verify::settings::{
    AllowListEntry, PolicySettings, SignaturePlacement, VerificationTarget,
};
use crate::verify::severity::{self, Concern};

pub const ALLOW_LIST_PROVIDER: &str = "allow_list";

const NO_REPOSITORY_ALLOW_LIST: &str = "A repository announced that their packages should be signed but an empty list of trusted certificates was found.";
const NO_CLIENT_ALLOW_LIST: &str = "A list of trusted signers is required but none was found.";
const NO_MATCH_CLIENT: &str = "The package signature certificate fingerprint does not match any certificate fingerprint in client allow list.";
const NO_MATCH_REPOSITORY: &str = "The package signature certificate fingerprint does not match any certificate fingerprint in repository allow list.";

/// A signature under test with its signer fingerprints.
struct Candidate<'a> {
    signature: &'a Signature,
    fingerprints: HashMap<HashAlgorithm, String>,
}

#[derive(Debug, Default, Clone)]
pub struct AllowListVerifier {
    client_allow_list: Option<Vec<AllowListEntry>>,
    repository_allow_list: Option<Vec<AllowListEntry>>,
}

impl AllowListVerifier {
    pub fn new(
        client_allow_list: Option<Vec<AllowListEntry>>,
        repository_allow_list: Option<Vec<AllowListEntry>>,
    ) -> Self {
        Self {
            client_allow_list,
            repository_allow_list,
        }
    }

    fn check_list(
        &self,
        list: Option<&[AllowListEntry]>,
        candidates: &[Candidate<'_>],
        settings: &PolicySettings,
        missing: (Concern, &str),
        no_match: &str,
        issues: &mut Vec<SignatureIssue>,
    ) {
        let entries = match list {
            Some(entries) if !entries.is_empty() => entries,
            _ => {
                let (concern, message) = missing;
                issues.extend(severity::issue(settings, concern, IssueCode::NoAllowList, message));
                return;
            }
        };

        let matched = candidates
            .iter()
            .any(|candidate| entries.iter().any(|entry| matches(entry, candidate)));
        if !matched {
            issues.extend(severity::issue(
                settings,
                Concern::NoAllowListMatch,
                IssueCode::NoMatchInAllowList,
                no_match,
            ));
        }
    }
}

fn matches(entry: &AllowListEntry, candidate: &Candidate<'_>) -> bool {
    let signature = candidate.signature;
    if !entry
        .target
        .intersects(VerificationTarget::of(signature.target))
        || !entry
            .placement
            .intersects(SignaturePlacement::of(signature.placement))
    {
        return false;
    }

    let fingerprint_matches = candidate
        .fingerprints
        .get(&entry.fingerprint_algorithm)
        .is_some_and(|fp| hash::fingerprints_match(&entry.fingerprint, fp));
    if !fingerprint_matches {
        return false;
    }

    match entry.owners.as_deref() {
        Some(owners) if !owners.is_empty() && signature.target == Target::Repository => {
            let package_owners = signature.package_owners();
            owners.iter().any(|owner| package_owners.contains(owner))
        }
        _ => true,
    }
}

fn candidates<'a>(
    signature: &'a PrimarySignature,
    settings: &PolicySettings,
    algorithms: &[HashAlgorithm],
) -> Result<Vec<Candidate<'a>>, VerifyError> {
    let mut out = Vec::new();
    let countersignature = signature
        .countersignature
        .as_ref()
        .filter(|_| !signature.has_illegal_combination());

    for sig in std::iter::once(&signature.signature).chain(countersignature) {
        if !settings.applies_to(sig) {
            continue;
        }
        let mut fingerprints = HashMap::new();
        for &algorithm in algorithms {
            fingerprints.insert(algorithm, sig.signer_certificate.fingerprint(algorithm)?);
        }
        out.push(Candidate {
            signature: sig,
            fingerprints,
        });
    }
    Ok(out)
}

#[async_trait]
impl VerificationProvider for AllowListVerifier {
    fn name(&self) -> &'static str {
        ALLOW_LIST_PROVIDER
    }

    async fn verify(
        &self,
        _package: &dyn PackageReader,
        signature: &PrimarySignature,
        settings: &PolicySettings,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, VerifyError> {
        if cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }

        let mut algorithms: Vec<HashAlgorithm> = self
            .client_allow_list
            .iter()
            .chain(self.repository_allow_list.iter())
            .flatten()
            .map(|entry| entry.fingerprint_algorithm)
            .collect();
        algorithms.sort();
        algorithms.dedup();

        let candidates = candidates(signature, settings, &algorithms)?;
        let mut issues = Vec::new();

        self.check_list(
            self.repository_allow_list.as_deref(),
            &candidates,
            settings,
            (Concern::MissingRepositoryAllowList, NO_REPOSITORY_ALLOW_LIST),
            NO_MATCH_REPOSITORY,
            &mut issues,
        );
        self.check_list(
            self.client_allow_list.as_deref(),
            &candidates,
            settings,
            (Concern::MissingClientAllowList, NO_CLIENT_ALLOW_LIST),
            NO_MATCH_CLIENT,
            &mut issues,
        );

        let trust = if issues.iter().any(|i| i.level == IssueLevel::Error) {
            SignatureVerificationStatus::Disallowed
        } else {
            SignatureVerificationStatus::Valid
        };
        debug!(
            candidates = candidates.len(),
            issues = issues.len(),
            ?trust,
            "checked allow lists"
        );
        Ok(VerificationResult::new(ALLOW_LIST_PROVIDER, trust, issues))
    }
}
