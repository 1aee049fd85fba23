//! Log subscriber setup for the `pkgsig` binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber. `--verbose` forces `debug`; otherwise
/// `RUST_LOG` applies, defaulting to `warn`.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
