//! Tracing subscriber initialization for the oncefs binary.
//!
//! Wires the `--verbose`/`--quiet` flags and the `ONCEFS_LOG`/`RUST_LOG`
//! environment variables into one `tracing-subscriber` stack that writes to
//! stderr, leaving stdout for the guarded command's own output.
//!
//! # Priority (highest to lowest)
//!
//! 1. `ONCEFS_LOG` env var (per-target directives, e.g. `oncefs=debug`)
//! 2. `RUST_LOG` env var
//! 3. CLI flags (`-v` → debug, `-q` → error)
//! 4. Default: `oncefs=info`, everything else `warn`

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Project-specific filter variable.
pub const LOG_ENV_VAR: &str = "ONCEFS_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `--quiet`: only errors.
    Quiet,
    /// Lock and operation transitions at info.
    Normal,
    /// `--verbose`: acquire/release and holder details at debug.
    Verbose,
}

impl Verbosity {
    /// Determine verbosity from the parsed CLI flags. Verbose wins over quiet.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Level applied to the `oncefs` target when no env filter is set.
    pub const fn crate_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. Call once, early in `main`.
///
/// Returns quietly if a subscriber is already installed.
pub fn init_subscriber(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(false)
        .with_level(true);

    let _ = if verbosity == Verbosity::Verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_timer(fmt::time::uptime()))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.without_time().compact())
            .try_init()
    };
}

/// Build an `EnvFilter`: `ONCEFS_LOG` > `RUST_LOG` > verbosity default.
///
/// Unparseable env values fall through to the next source.
fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV_VAR)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(default_directive(verbosity))
}

fn default_directive(verbosity: Verbosity) -> String {
    let crate_level = verbosity.crate_level();
    let other_level = if verbosity == Verbosity::Quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    format!("{},oncefs={}", other_level, crate_level).to_lowercase()
}
