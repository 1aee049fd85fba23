// main.rs — pkgsig CLI entry point
//
// Signing commands produce the signature entry of a package directory;
// `verify` runs the full provider set and exits 0 only for a valid package.

mod cli;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use cli::{CertAction, CertificateKind, Cli, Commands, SignerArgs};
use pkgsig::config::TrustPolicyFile;
use pkgsig::hash::HashAlgorithm;
use pkgsig::package::{DirectoryPackage, PackageReader};
use pkgsig::pki::{
    CertificateAuthority, CertificateFile, CertificateRequest, CertifiedKey, RevocationMode,
    TimestampAuthority,
};
use pkgsig::signature::{PrimarySignature, RepositoryMetadata, SignatureBuilder, Target};
use pkgsig::verify::{AggregateResult, IssueLevel, PackageSignatureVerifier};
use pkgsig::{logging, sign};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Keygen { output, name } => cmd_keygen(output, &name),
        Commands::Cert { action } => match action {
            CertAction::Root {
                subject,
                keyfile,
                days,
                out,
            } => cmd_cert_root(&subject, keyfile.as_deref(), days, &out),
            CertAction::Issue {
                ca_cert,
                ca_keyfile,
                public_key,
                subject,
                kind,
                days,
                out,
            } => cmd_cert_issue(&ca_cert, &ca_keyfile, &public_key, &subject, kind, days, &out),
        },
        Commands::Sign {
            signer,
            repository,
            owners,
            overwrite,
        } => cmd_sign(&signer, repository.map(|url| repository_metadata(url, owners)), overwrite),
        Commands::Countersign {
            signer,
            service_index,
            owners,
        } => cmd_countersign(&signer, repository_metadata(service_index, owners)),
        Commands::Verify {
            package,
            policy,
            policy_file,
            trust_roots,
            revocation_list,
            offline,
            json,
        } => {
            let mut trust_policy = match &policy_file {
                Some(path) => TrustPolicyFile::load(path)?,
                None => TrustPolicyFile {
                    mode: pkgsig::config::ValidationMode::Verify,
                    ..TrustPolicyFile::default()
                },
            };
            if let Some(mode) = policy {
                trust_policy.mode = mode;
            }
            trust_policy.trusted_roots.extend(trust_roots);
            if revocation_list.is_some() {
                trust_policy.revocation_list = revocation_list;
            }
            if offline {
                trust_policy.revocation_mode = Some(RevocationMode::Offline);
            }

            let valid = cmd_verify(&package, &trust_policy, json).await?;
            std::process::exit(if valid { 0 } else { 1 })
        }
        Commands::Fingerprint { cert, algorithm } => {
            let file = CertificateFile::load(&cert)
                .with_context(|| format!("reading certificate {}", cert.display()))?;
            println!("{}", file.certificate.fingerprint(algorithm)?);
            Ok(())
        }
    }
}

fn cmd_keygen(output: Option<PathBuf>, name: &str) -> Result<()> {
    let (sk, pk) = sign::keygen();
    let dir = output.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)?;

    let sk_path = dir.join(format!("{name}.sk"));
    let pk_path = dir.join(format!("{name}.pk"));

    fs::write(&sk_path, sk.as_bytes())?;
    fs::write(&pk_path, &pk)?;

    eprintln!("Ed25519 keypair generated:");
    eprintln!("  Secret key: {}", sk_path.display());
    eprintln!("  Public key: {}", pk_path.display());
    eprintln!();
    eprintln!("Public key (base64): {}", pk);
    eprintln!();
    eprintln!("To sign in CI, set the secret key as:");
    eprintln!("  {}=<contents of {}>", sign::SIGNING_KEY_ENV, sk_path.display());

    Ok(())
}

fn validity(days: i64) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    if days <= 0 {
        bail!("--days must be positive");
    }
    let now = Utc::now();
    Ok((now - Duration::hours(1), now + Duration::days(days)))
}

fn cmd_cert_root(subject: &str, keyfile: Option<&Path>, days: i64, out: &Path) -> Result<()> {
    let key = sign::load_secret_key(keyfile)?;
    let (not_before, not_after) = validity(days)?;
    let request =
        CertificateRequest::certificate_authority(subject).valid_between(not_before, not_after);
    let root = CertifiedKey::self_signed(&request, key)?;

    CertificateFile::from(&root).save(out)?;
    eprintln!("[pkgsig] Root certificate: {}", out.display());
    eprintln!(
        "[pkgsig]   SHA256 fingerprint: {}",
        root.certificate.fingerprint(HashAlgorithm::Sha256)?
    );
    Ok(())
}

fn cmd_cert_issue(
    ca_cert: &Path,
    ca_keyfile: &Path,
    public_key: &Path,
    subject: &str,
    kind: CertificateKind,
    days: i64,
    out: &Path,
) -> Result<()> {
    let ca_key = CertificateFile::load(ca_cert)
        .with_context(|| format!("reading CA certificate {}", ca_cert.display()))?
        .with_key(sign::read_secret_key_file(ca_keyfile)?)?;
    let ca = CertificateAuthority::from_key(ca_key)?;

    let (not_before, not_after) = validity(days)?;
    let request = match kind {
        CertificateKind::CodeSigning => CertificateRequest::code_signing(subject),
        CertificateKind::TimeStamping => CertificateRequest::time_stamping(subject),
        CertificateKind::Intermediate => CertificateRequest::certificate_authority(subject),
    }
    .valid_between(not_before, not_after);

    let public_key = fs::read_to_string(public_key)
        .with_context(|| format!("reading public key {}", public_key.display()))?;
    let certificate = ca.certify(&request, public_key.trim())?;
    let fingerprint = certificate.fingerprint(HashAlgorithm::Sha256)?;
    CertificateFile::new(certificate, ca.issued_chain()).save(out)?;

    eprintln!("[pkgsig] Issued {:?} certificate: {}", kind, out.display());
    eprintln!("[pkgsig]   Subject: {}", subject);
    eprintln!("[pkgsig]   SHA256 fingerprint: {}", fingerprint);
    Ok(())
}

fn repository_metadata(service_index: url::Url, owners: Vec<String>) -> RepositoryMetadata {
    let metadata = RepositoryMetadata::new(service_index);
    if owners.is_empty() {
        metadata
    } else {
        metadata.with_owners(owners)
    }
}

/// Load the signing identity and optional timestamp authority.
fn load_signer(args: &SignerArgs) -> Result<(CertifiedKey, Option<TimestampAuthority>)> {
    let signer = CertificateFile::load(&args.cert)
        .with_context(|| format!("reading signer certificate {}", args.cert.display()))?
        .with_key(sign::load_secret_key(args.keyfile.as_deref())?)?;

    let tsa = match (&args.tsa_cert, &args.tsa_keyfile) {
        (Some(cert), Some(keyfile)) => {
            let identity = CertificateFile::load(cert)
                .with_context(|| format!("reading TSA certificate {}", cert.display()))?
                .with_key(sign::read_secret_key_file(keyfile)?)?;
            Some(TimestampAuthority::new(identity))
        }
        _ => None,
    };
    Ok((signer, tsa))
}

fn signature_builder<'a>(
    signer: &'a CertifiedKey,
    tsa: Option<&'a TimestampAuthority>,
    hash: HashAlgorithm,
) -> SignatureBuilder<'a> {
    let builder = SignatureBuilder::new(signer).digest_algorithm(hash);
    match tsa {
        Some(tsa) => builder.timestamped_by(tsa),
        None => builder,
    }
}

fn cmd_sign(
    args: &SignerArgs,
    repository: Option<RepositoryMetadata>,
    overwrite: bool,
) -> Result<()> {
    let package = DirectoryPackage::open(&args.package)?;
    if package.is_signed()? && !overwrite {
        bail!(
            "{} is already signed; pass --overwrite to replace the signature",
            package.identity()
        );
    }

    let (signer, tsa) = load_signer(args)?;
    let builder = signature_builder(&signer, tsa.as_ref(), args.hash);
    let signature = match repository {
        Some(metadata) => builder.repository(&package, metadata)?,
        None => builder.author(&package)?,
    };
    package.write_signature(&signature)?;

    report_signature("Signed", &package, &signature);
    Ok(())
}

fn cmd_countersign(args: &SignerArgs, metadata: RepositoryMetadata) -> Result<()> {
    let package = DirectoryPackage::open(&args.package)?;
    let Some(primary) = package.primary_signature()? else {
        bail!("{} is not signed", package.identity());
    };
    if primary.signature.target == Target::Repository {
        bail!("a repository primary signature cannot be countersigned");
    }

    let (signer, tsa) = load_signer(args)?;
    let signature =
        signature_builder(&signer, tsa.as_ref(), args.hash).countersign(&primary, metadata)?;
    package.write_signature(&signature)?;

    report_signature("Countersigned", &package, &signature);
    Ok(())
}

fn report_signature(action: &str, package: &DirectoryPackage, signature: &PrimarySignature) {
    eprintln!("[pkgsig] {}: {}", action, package.identity());
    for sig in signature.signatures() {
        eprintln!("[pkgsig]   {}", sig.describe());
        if let Some(ts) = sig.timestamps.first() {
            eprintln!("[pkgsig]     timestamped at {}", ts.generalized_time());
        }
    }
}

async fn cmd_verify(package: &Path, policy: &TrustPolicyFile, json: bool) -> Result<bool> {
    let package = DirectoryPackage::open(package)?;
    let settings = policy.settings();
    let verifier = PackageSignatureVerifier::new(policy.providers()?)?;

    let result = verifier
        .verify(&package, &settings, &CancellationToken::new())
        .await
        .with_context(|| format!("verifying {}", package.identity()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&package, &result)?;
    }
    Ok(result.is_valid)
}

fn print_summary(package: &DirectoryPackage, result: &AggregateResult) -> Result<()> {
    eprintln!("[pkgsig] Verifying package: {}", package.identity());
    if let Some(signature) = package.primary_signature()? {
        for sig in signature.signatures() {
            eprintln!("[pkgsig] Signature: {}", sig.describe());
            eprintln!(
                "[pkgsig]   SHA256 fingerprint: {}",
                sig.signer_certificate.fingerprint(HashAlgorithm::Sha256)?
            );
            eprintln!(
                "[pkgsig]   Valid from {} to {}",
                sig.signer_certificate.body.not_before, sig.signer_certificate.body.not_after
            );
            for ts in &sig.timestamps {
                eprintln!(
                    "[pkgsig]   Timestamp: {} ({})",
                    ts.generalized_time(),
                    ts.tsa_certificate.subject()
                );
            }
        }
    }

    for provider in &result.results {
        eprintln!("[pkgsig] {}: {:?}", provider.provider, provider.trust);
        for issue in &provider.issues {
            let level = match issue.level {
                IssueLevel::Error => "error",
                IssueLevel::Warning => "warning",
                IssueLevel::Information => "info",
            };
            eprintln!("[pkgsig]   {level}: {}: {}", issue.code, issue.message);
        }
    }

    if result.is_valid {
        eprintln!("[pkgsig] Result: VERIFIED");
    } else {
        eprintln!("[pkgsig] Result: NOT VERIFIED");
    }
    Ok(())
}
