//! Certificate revocation checking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RevocationError;
use crate::signature::Certificate;

/// Environment variable that overrides the revocation mode of every preset.
pub const REVOCATION_MODE_ENV: &str = "PKGSIG_CERT_REVOCATION_MODE";

/// How unavailable revocation data is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationMode {
    #[default]
    Online,
    /// Only locally available revocation data is expected; an unknown
    /// status is informational.
    Offline,
}

impl RevocationMode {
    /// Read `PKGSIG_CERT_REVOCATION_MODE`, defaulting to `Online`.
    pub fn from_env() -> Self {
        match std::env::var(REVOCATION_MODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %value,
                    "ignoring unrecognized {REVOCATION_MODE_ENV}"
                );
                RevocationMode::Online
            }),
            _ => RevocationMode::Online,
        }
    }
}

impl FromStr for RevocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(RevocationMode::Online),
            "offline" => Ok(RevocationMode::Offline),
            other => Err(format!("unknown revocation mode '{other}'")),
        }
    }
}

impl fmt::Display for RevocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationMode::Online => f.write_str("online"),
            RevocationMode::Offline => f.write_str("offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    Good,
    Revoked { revoked_at: DateTime<Utc> },
    /// The status could not be determined.
    Unknown(String),
}

/// Answers revocation queries for a certificate issued by `issuer`.
#[async_trait]
pub trait RevocationSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RevocationError`] if the source cannot be queried.
    async fn status(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
    ) -> Result<RevocationStatus, RevocationError>;
}

/// A revoked certificate entry in a revocation list file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedCertificate {
    pub serial_number: String,
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RevocationListFile {
    #[serde(default)]
    revoked: Vec<RevokedCertificate>,
}

/// An in-memory [`RevocationSource`] keyed by certificate serial number.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRevocationList {
    revoked: HashMap<String, DateTime<Utc>>,
    unreachable: bool,
    latency: Option<Duration>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a revocation list file (`{"revoked": [{serial_number, revoked_at}]}`).
    pub fn from_json(bytes: &[u8]) -> Result<Self, RevocationError> {
        let file: RevocationListFile =
            serde_json::from_slice(bytes).map_err(|e| RevocationError::Parse(e.to_string()))?;
        let mut list = Self::new();
        for entry in file.revoked {
            list.revoke(entry.serial_number, entry.revoked_at);
        }
        Ok(list)
    }

    pub fn load(path: &Path) -> Result<Self, RevocationError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RevocationError::Parse(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&bytes)
    }

    /// Mark a certificate serial as revoked from `revoked_at` onwards.
    pub fn revoke(&mut self, serial_number: impl Into<String>, revoked_at: DateTime<Utc>) {
        self.revoked.insert(serial_number.into(), revoked_at);
    }

    /// Make every query fail as if the responder were offline.
    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }

    /// Delay every answer, simulating a slow responder.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl RevocationSource for InMemoryRevocationList {
    async fn status(
        &self,
        certificate: &Certificate,
        _issuer: &Certificate,
    ) -> Result<RevocationStatus, RevocationError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable {
            return Err(RevocationError::Unreachable(
                "the revocation server could not be reached".to_string(),
            ));
        }
        Ok(match self.revoked.get(certificate.serial_number()) {
            Some(revoked_at) => RevocationStatus::Revoked {
                revoked_at: *revoked_at,
            },
            None => RevocationStatus::Good,
        })
    }
}
