//! Verification policy: every toggle that changes verifier behavior, plus
//! the named presets callers start from.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

use crate::hash::HashAlgorithm;
use crate::signature::{Placement, Signature, Target};

pub use crate::pki::RevocationMode;

/// Set of signer roles a verification applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Target>", into = "Vec<Target>")]
pub struct VerificationTarget(u8);

impl VerificationTarget {
    pub const NONE: Self = Self(0);
    pub const AUTHOR: Self = Self(0b01);
    pub const REPOSITORY: Self = Self(0b10);
    pub const ALL: Self = Self(0b11);

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn of(target: Target) -> Self {
        match target {
            Target::Author => Self::AUTHOR,
            Target::Repository => Self::REPOSITORY,
            Target::Unknown => Self::NONE,
        }
    }
}

impl BitOr for VerificationTarget {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Vec<Target>> for VerificationTarget {
    fn from(targets: Vec<Target>) -> Self {
        targets.into_iter().fold(Self::NONE, |acc, t| acc | Self::of(t))
    }
}

impl From<VerificationTarget> for Vec<Target> {
    fn from(value: VerificationTarget) -> Self {
        [Target::Author, Target::Repository]
            .into_iter()
            .filter(|t| value.contains(VerificationTarget::of(*t)))
            .collect()
    }
}

/// Set of signature positions a verification applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Placement>", into = "Vec<Placement>")]
pub struct SignaturePlacement(u8);

impl SignaturePlacement {
    pub const NONE: Self = Self(0);
    pub const PRIMARY_SIGNATURE: Self = Self(0b01);
    pub const COUNTERSIGNATURE: Self = Self(0b10);
    pub const ANY: Self = Self(0b11);

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn of(placement: Placement) -> Self {
        match placement {
            Placement::PrimarySignature => Self::PRIMARY_SIGNATURE,
            Placement::Countersignature => Self::COUNTERSIGNATURE,
        }
    }
}

impl BitOr for SignaturePlacement {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Vec<Placement>> for SignaturePlacement {
    fn from(placements: Vec<Placement>) -> Self {
        placements
            .into_iter()
            .fold(Self::NONE, |acc, p| acc | Self::of(p))
    }
}

impl From<SignaturePlacement> for Vec<Placement> {
    fn from(value: SignaturePlacement) -> Self {
        [Placement::PrimarySignature, Placement::Countersignature]
            .into_iter()
            .filter(|p| value.contains(SignaturePlacement::of(*p)))
            .collect()
    }
}

/// When a repository countersignature is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountersignatureBehavior {
    /// Ignore countersignatures.
    Never,
    /// Evaluate a countersignature whenever one exists.
    IfExists,
    /// Evaluate a countersignature only when the primary signature alone
    /// does not establish trust.
    IfExistsAndIsNecessary,
    /// Require a countersignature.
    Always,
}

/// A trusted-signer rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub target: VerificationTarget,
    pub placement: SignaturePlacement,
    pub fingerprint: String,
    pub fingerprint_algorithm: HashAlgorithm,
    /// `None` and an empty list both mean no owner restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
}

impl AllowListEntry {
    pub fn new(
        fingerprint: impl Into<String>,
        fingerprint_algorithm: HashAlgorithm,
        target: VerificationTarget,
        placement: SignaturePlacement,
    ) -> Self {
        Self {
            target,
            placement,
            fingerprint: fingerprint.into(),
            fingerprint_algorithm,
            owners: None,
        }
    }

    pub fn with_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners = Some(owners.into_iter().map(Into::into).collect());
        self
    }
}

/// Immutable verification configuration, one per verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub allow_unsigned: bool,
    pub allow_illegal: bool,
    pub allow_untrusted: bool,
    pub allow_ignore_timestamp: bool,
    pub allow_multiple_timestamps: bool,
    pub allow_no_timestamp: bool,
    pub allow_unknown_revocation: bool,
    pub report_unknown_revocation: bool,
    /// When false, an empty or absent client allow list is an error.
    pub allow_no_client_allow_list: bool,
    pub allow_no_repository_allow_list: bool,
    pub verification_target: VerificationTarget,
    pub signature_placement: SignaturePlacement,
    pub countersignature_behavior: CountersignatureBehavior,
    pub revocation_mode: RevocationMode,
    /// SHA-256 fingerprints of untrusted roots accepted with a warning.
    #[serde(default)]
    pub allowed_untrusted_roots: Vec<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            allow_unsigned: true,
            allow_illegal: true,
            allow_untrusted: true,
            allow_ignore_timestamp: true,
            allow_multiple_timestamps: true,
            allow_no_timestamp: true,
            allow_unknown_revocation: true,
            report_unknown_revocation: false,
            allow_no_client_allow_list: true,
            allow_no_repository_allow_list: true,
            verification_target: VerificationTarget::ALL,
            signature_placement: SignaturePlacement::ANY,
            countersignature_behavior: CountersignatureBehavior::IfExists,
            revocation_mode: RevocationMode::from_env(),
            allowed_untrusted_roots: Vec::new(),
        }
    }
}

impl PolicySettings {
    /// Permissive policy used when installing packages by default.
    pub fn accept() -> Self {
        Self::default()
    }

    /// Strict policy: every package must be signed by a trusted signer.
    pub fn require() -> Self {
        Self {
            allow_unsigned: false,
            allow_illegal: false,
            allow_untrusted: false,
            report_unknown_revocation: true,
            allow_no_client_allow_list: false,
            countersignature_behavior: CountersignatureBehavior::IfExistsAndIsNecessary,
            ..Self::default()
        }
    }

    /// Policy of the `verify` command.
    pub fn verify_command() -> Self {
        Self {
            allow_unsigned: false,
            allow_illegal: false,
            allow_untrusted: false,
            allow_ignore_timestamp: false,
            allow_multiple_timestamps: false,
            report_unknown_revocation: true,
            countersignature_behavior: CountersignatureBehavior::IfExistsAndIsNecessary,
            ..Self::default()
        }
    }

    /// Whether `signature` falls inside the configured target and placement.
    pub fn applies_to(&self, signature: &Signature) -> bool {
        match signature.placement {
            Placement::PrimarySignature => {
                self.signature_placement
                    .contains(SignaturePlacement::PRIMARY_SIGNATURE)
                    && self
                        .verification_target
                        .intersects(VerificationTarget::of(signature.target))
            }
            Placement::Countersignature => {
                self.signature_placement
                    .contains(SignaturePlacement::COUNTERSIGNATURE)
                    && self
                        .verification_target
                        .contains(VerificationTarget::REPOSITORY)
            }
        }
    }
}
