use thiserror::Error;

/// Failures that abort a call. Malformed source is never one of these; it is
/// reported through [`crate::Diagnostic`]s instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid grammar version `{0}`: expected MAJOR.MINOR")]
    InvalidVersion(String),

    #[error("unsupported grammar version `{0}`: supported versions are 3.3 through 3.8")]
    UnsupportedVersion(String),

    /// An invariant inside the parser or scope analyzer was broken.
    #[error("internal parser error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
