//! Tracing subscriber setup
//!
//! Events go to stderr so `--json` output on stdout stays parseable.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Crate-specific filter variable, checked before `RUST_LOG`
pub const LOG_ENV: &str = "NVSHU_LOG";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Logging options from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Default to `debug` instead of `info` when no filter variable is set
    pub verbose: bool,
    /// Never emit ANSI colors
    pub no_color: bool,
}

/// Filter from `NVSHU_LOG`, then `RUST_LOG`, then the default level
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Install the global subscriber. Returns false when one was already set.
pub fn init_tracing(options: LogOptions) -> bool {
    if INITIALISED.set(()).is_err() {
        return false;
    }

    let ansi = !options.no_color && std::io::stderr().is_terminal();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(std::io::stderr);

    Registry::default()
        .with(env_filter(options.verbose))
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
