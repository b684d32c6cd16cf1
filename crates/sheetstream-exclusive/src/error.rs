//! Exclusive control errors.

use thiserror::Error;

/// Exclusive control error types.
#[derive(Debug, Error)]
pub enum ExclusiveError {
    /// UTC offset outside the representable range.
    #[error("Invalid UTC offset: {0} hours")]
    InvalidOffset(i32),

    /// Marker prefix or worker id would break the marker format.
    #[error("Invalid marker token: {0}")]
    InvalidToken(String),
}
