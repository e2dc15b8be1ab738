//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed, or a required
    /// value is missing.
    #[display("failed to load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// Every value was present, but at least one of them is unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Configuration is read once at startup; fixing it is up to the user.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::Invalid("workers must be positive".to_string()).to_string(),
            "invalid configuration: workers must be positive"
        );
        assert!(!ErrorKind::Load("x".to_string()).is_retryable());
    }
}
