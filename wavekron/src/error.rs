//! Catch-all error type for this crate.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run configuration: unknown PDE name, inconsistent level or
    /// degree, a budget too small to hold a single coupling.
    #[error("configuration error: {0}")]
    Config(String),
    /// The solution left the representable range (NaN or infinity), or a
    /// factorization hit an exactly singular pivot.
    #[error("numeric error: {0}")]
    Numeric(String),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for `Result` with this crate's [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
