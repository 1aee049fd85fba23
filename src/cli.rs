// cli.rs — Command-line interface definitions (clap derive)
//
// Defines the top-level `pkgsig` command:
//   pkgsig keygen       — generate an Ed25519 keypair
//   pkgsig cert root    — self-signed root certificate for a key
//   pkgsig cert issue   — issue a certificate for a public key
//   pkgsig sign         — author or repository primary signature
//   pkgsig countersign  — repository countersignature
//   pkgsig verify       — verify a package against a trust policy
//   pkgsig fingerprint  — certificate fingerprint for allow lists

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use url::Url;

use pkgsig::config::ValidationMode;
use pkgsig::hash::HashAlgorithm;

#[derive(Parser)]
#[command(name = "pkgsig")]
#[command(about = "pkgsig — package signing and signature verification")]
#[command(version)]
pub struct Cli {
    /// Log verification internals at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an Ed25519 keypair
    Keygen {
        /// Output directory for key files (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base name of the key files
        #[arg(long, default_value = "pkgsig")]
        name: String,
    },

    /// Certificate management
    Cert {
        #[command(subcommand)]
        action: CertAction,
    },

    /// Sign a package directory
    Sign {
        #[command(flatten)]
        signer: SignerArgs,

        /// Sign as a repository with this service index URL (default: author)
        #[arg(long)]
        repository: Option<Url>,

        /// Package owners recorded in a repository signature
        #[arg(long = "owner", requires = "repository")]
        owners: Vec<String>,

        /// Replace an existing signature
        #[arg(long)]
        overwrite: bool,
    },

    /// Add a repository countersignature to a signed package
    Countersign {
        #[command(flatten)]
        signer: SignerArgs,

        /// Service index URL of the countersigning repository
        #[arg(long)]
        service_index: Url,

        /// Package owners recorded in the countersignature
        #[arg(long = "owner")]
        owners: Vec<String>,
    },

    /// Verify a package signature
    Verify {
        /// Package directory
        #[arg(long)]
        package: PathBuf,

        /// Policy preset (overrides the policy file's mode)
        #[arg(long, value_enum)]
        policy: Option<ValidationMode>,

        /// Trust policy JSON file
        #[arg(long)]
        policy_file: Option<PathBuf>,

        /// Trusted root certificate file (repeatable)
        #[arg(long = "trust-root")]
        trust_roots: Vec<PathBuf>,

        /// Revocation list JSON file
        #[arg(long)]
        revocation_list: Option<PathBuf>,

        /// Treat unavailable revocation data as informational
        #[arg(long)]
        offline: bool,

        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print a certificate fingerprint
    Fingerprint {
        /// Certificate file
        #[arg(long)]
        cert: PathBuf,

        /// Hash algorithm
        #[arg(long, default_value = "SHA256")]
        algorithm: HashAlgorithm,
    },
}

#[derive(Subcommand)]
pub enum CertAction {
    /// Create a self-signed root certificate for an existing key
    Root {
        /// Subject distinguished name, e.g. "CN=Contoso Root"
        #[arg(long)]
        subject: String,

        /// Path to the Ed25519 secret key file
        #[arg(long)]
        keyfile: Option<PathBuf>,

        /// Validity in days
        #[arg(long, default_value_t = 3650)]
        days: i64,

        /// Output certificate file
        #[arg(long)]
        out: PathBuf,
    },

    /// Issue a certificate for a public key
    Issue {
        /// Issuing CA certificate file
        #[arg(long)]
        ca_cert: PathBuf,

        /// Issuing CA secret key file
        #[arg(long)]
        ca_keyfile: PathBuf,

        /// Public key file of the subject (as written by `keygen`)
        #[arg(long)]
        public_key: PathBuf,

        /// Subject distinguished name
        #[arg(long)]
        subject: String,

        #[arg(long, value_enum, default_value_t = CertificateKind::CodeSigning)]
        kind: CertificateKind,

        /// Validity in days
        #[arg(long, default_value_t = 365)]
        days: i64,

        /// Output certificate file
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CertificateKind {
    CodeSigning,
    TimeStamping,
    Intermediate,
}

/// Signer identity and timestamping options shared by `sign` and
/// `countersign`.
#[derive(Args)]
pub struct SignerArgs {
    /// Package directory
    #[arg(long)]
    pub package: PathBuf,

    /// Signer certificate file
    #[arg(long)]
    pub cert: PathBuf,

    /// Path to the signer's Ed25519 secret key file
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Digest algorithm
    #[arg(long, default_value = "SHA256")]
    pub hash: HashAlgorithm,

    /// Timestamp authority certificate file
    #[arg(long, requires = "tsa_keyfile")]
    pub tsa_cert: Option<PathBuf>,

    /// Timestamp authority secret key file
    #[arg(long, requires = "tsa_cert")]
    pub tsa_keyfile: Option<PathBuf>,
}
