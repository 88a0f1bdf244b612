//! Chat store error types

/// Error type for chat persistence operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backing store could not be reached
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
