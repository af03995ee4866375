use thiserror::Error;

/// Errors produced by trie operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HamtError {
    /// A constructor argument was outside its valid domain (bad `w`/`t`,
    /// a null key or value, or a root size that does not fit `usize`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A split would have required a Table deeper than `d_max`.
    #[error("maximum trie depth exceeded")]
    MaxDepthExceeded,

    /// Lookup or delete found no entry for the given key.
    #[error("key not found")]
    NotFound,
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, HamtError>;
