// config.rs — Trust policy file
//
// A JSON document that selects a policy preset and supplies everything the
// verifier cannot know on its own: trusted roots, allow lists, explicitly
// allowed untrusted roots and revocation data. Relative paths resolve
// against the policy file's directory.
//
// {
//   "mode": "require",
//   "trusted_roots": ["roots/contoso.cert.json"],
//   "client_allow_list": [{ "target": ["Author"], "placement": ["PrimarySignature"],
//                           "fingerprint": "…", "fingerprint_algorithm": "SHA256" }],
//   "revocation_mode": "offline",
//   "revocation_list": "revoked.json"
// }

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pki::{load_certificates, InMemoryRevocationList, SoftwarePlatform};
use crate::verify::{
    AllowListEntry, AllowListVerifier, CountersignatureBehavior, IntegrityVerifier,
    PolicySettings, RevocationMode, TrustVerifier, VerificationProvider,
};

/// Named policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Permissive install-time policy.
    #[default]
    Accept,
    /// Every package must be signed by a trusted, allow-listed signer.
    Require,
    /// Strict policy of `pkgsig verify`.
    Verify,
}

impl ValidationMode {
    pub fn settings(self) -> PolicySettings {
        match self {
            ValidationMode::Accept => PolicySettings::accept(),
            ValidationMode::Require => PolicySettings::require(),
            ValidationMode::Verify => PolicySettings::verify_command(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustPolicyFile {
    #[serde(default)]
    pub mode: ValidationMode,
    /// Certificate files of trusted roots.
    #[serde(default)]
    pub trusted_roots: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_allow_list: Option<Vec<AllowListEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_allow_list: Option<Vec<AllowListEntry>>,
    #[serde(default)]
    pub allowed_untrusted_roots: Vec<String>,
    /// Overrides the preset (and the environment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_mode: Option<RevocationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_list: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countersignature_behavior: Option<CountersignatureBehavior>,
}

impl TrustPolicyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading trust policy {}", path.display()))?;
        let mut policy: TrustPolicyFile = serde_json::from_str(&data)
            .with_context(|| format!("parsing trust policy {}", path.display()))?;

        if let Some(base) = path.parent() {
            policy.resolve_paths(base);
        }
        Ok(policy)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for root in &mut self.trusted_roots {
            if root.is_relative() {
                *root = base.join(&*root);
            }
        }
        if let Some(list) = &mut self.revocation_list {
            if list.is_relative() {
                *list = base.join(&*list);
            }
        }
    }

    pub fn settings(&self) -> PolicySettings {
        let mut settings = self.mode.settings();
        if let Some(mode) = self.revocation_mode {
            settings.revocation_mode = mode;
        }
        if let Some(behavior) = self.countersignature_behavior {
            settings.countersignature_behavior = behavior;
        }
        settings
            .allowed_untrusted_roots
            .extend(self.allowed_untrusted_roots.iter().cloned());
        settings
    }

    pub fn platform(&self) -> Result<SoftwarePlatform> {
        let roots = load_certificates(&self.trusted_roots).context("loading trusted roots")?;
        let mut platform = SoftwarePlatform::new(roots);
        if let Some(path) = &self.revocation_list {
            let list = InMemoryRevocationList::load(path)
                .with_context(|| format!("loading revocation list {}", path.display()))?;
            platform = platform.with_revocation_source(Arc::new(list));
        }
        Ok(platform)
    }

    /// The full provider set: integrity, trust and allow list.
    pub fn providers(&self) -> Result<Vec<Arc<dyn VerificationProvider>>> {
        let platform = self.platform()?;
        let providers: Vec<Arc<dyn VerificationProvider>> = vec![
            Arc::new(IntegrityVerifier::new()),
            Arc::new(TrustVerifier::new(Arc::new(platform))),
            Arc::new(AllowListVerifier::new(
                self.client_allow_list.clone(),
                self.repository_allow_list.clone(),
            )),
        ];
        Ok(providers)
    }
}
