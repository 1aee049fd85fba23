//! Package signature verification.
//!
//! A package carries one signature entry: an author or repository primary
//! signature over the package content, optionally with a repository
//! countersignature over the primary signature value. Verification runs a
//! set of [`verify::VerificationProvider`]s under a
//! [`verify::PolicySettings`] and folds their results into one verdict.
//!
//! - [`signature`]: the signature content model and the signer
//! - [`pki`]: certificates, chains, revocation and trust roots
//! - [`package`]: package containers
//! - [`verify`]: the providers and the orchestrating verifier
//! - [`config`]: trust policy files used by the `pkgsig` binary

pub mod config;
pub mod error;
pub mod hash;
pub mod logging;
pub mod package;
pub mod pki;
pub mod sign;
pub mod signature;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;
