//! Error types and the process-wide fatal-error path.
//!
//! Two failure classes exist in this system:
//!
//! - Recoverable contract errors surface as [`VivariumError`] values from
//!   fallible loaders and validators.
//! - Deployment-invariant failures (missing static assets, an unavailable
//!   accelerator device) abort the process through [`fatal`]. A manager is
//!   never returned in a partially initialized state, and there is no retry
//!   or degraded mode anywhere in this core.

use std::fmt;

use thiserror::Error;

/// Result type for vivarium operations.
pub type Result<T> = std::result::Result<T, VivariumError>;

/// Error types that can occur while loading assets or validating
/// configuration.
#[derive(Debug, Error)]
pub enum VivariumError {
    /// Invalid configuration (zero worlds, bad view dimensions, etc.)
    #[error("invalid configuration for '{param}': {message}")]
    InvalidConfig { param: &'static str, message: String },

    /// A static asset file is missing or malformed.
    #[error("asset '{path}': {message}")]
    Asset { path: String, message: String },

    /// Backend-specific initialization failure.
    #[error("backend: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Log a fatal error and terminate the process.
///
/// Static asset content and accelerator availability are deployment
/// invariants, not runtime conditions; when they are violated the process
/// cannot do useful work, so this logs through the `log` facade, mirrors
/// the message to stderr (the logger may not be initialized yet during
/// early startup), and exits.
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    log::error!("fatal: {args}");
    eprintln!("fatal: {args}");
    std::process::exit(1);
}

/// Format-and-terminate wrapper around [`fatal`].
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::error::fatal(core::format_args!($($arg)*))
    };
}
