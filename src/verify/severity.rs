//! Issue severity resolution.
//!
//! Every interaction between a policy flag and the level of the issue it
//! governs lives here. Providers describe what they found as a [`Concern`]
//! and ask for the level; `None` means the policy accepts the condition
//! silently.

use crate::verify::result::{IssueCode, IssueLevel, SignatureIssue};
use crate::verify::settings::{PolicySettings, RevocationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Concern {
    Unsigned,
    IllegalCombination,
    /// Chain ends in an untrusted root or cannot be completed.
    UntrustedRoot,
    /// A chain certificate outside its validity period, or a signer
    /// without the code signing purpose.
    CertificateNotAcceptable,
    UnknownRevocation,
    MissingTimestamp,
    MultipleTimestamps,
    /// Timestamp failed verification and may be ignored.
    InvalidTimestamp,
    MissingClientAllowList,
    MissingRepositoryAllowList,
    NoAllowListMatch,
}

pub(crate) fn level(settings: &PolicySettings, concern: Concern) -> Option<IssueLevel> {
    let error_unless = |allowed: bool, relaxed: Option<IssueLevel>| {
        if allowed {
            relaxed
        } else {
            Some(IssueLevel::Error)
        }
    };

    match concern {
        Concern::Unsigned => error_unless(settings.allow_unsigned, None),
        Concern::IllegalCombination => {
            error_unless(settings.allow_illegal, Some(IssueLevel::Warning))
        }
        Concern::UntrustedRoot | Concern::CertificateNotAcceptable | Concern::NoAllowListMatch => {
            error_unless(settings.allow_untrusted, Some(IssueLevel::Warning))
        }
        Concern::UnknownRevocation => match settings.revocation_mode {
            RevocationMode::Offline => Some(IssueLevel::Information),
            RevocationMode::Online if !settings.allow_unknown_revocation => Some(IssueLevel::Error),
            RevocationMode::Online if settings.report_unknown_revocation => Some(IssueLevel::Warning),
            RevocationMode::Online => Some(IssueLevel::Information),
        },
        Concern::MissingTimestamp => error_unless(settings.allow_no_timestamp, None),
        Concern::MultipleTimestamps => error_unless(settings.allow_multiple_timestamps, None),
        Concern::InvalidTimestamp => {
            error_unless(settings.allow_ignore_timestamp, Some(IssueLevel::Warning))
        }
        Concern::MissingClientAllowList => error_unless(settings.allow_no_client_allow_list, None),
        Concern::MissingRepositoryAllowList => {
            error_unless(settings.allow_no_repository_allow_list, None)
        }
    }
}

/// Build the issue for `concern`, or `None` when the policy accepts it.
pub(crate) fn issue(
    settings: &PolicySettings,
    concern: Concern,
    code: IssueCode,
    message: impl Into<String>,
) -> Option<SignatureIssue> {
    level(settings, concern).map(|level| SignatureIssue::new(code, level, message))
}
