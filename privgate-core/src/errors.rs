//! errors.rs - Custom error types for the privgate-core library.
//!
//! This module defines a structured error enum for the library, providing
//! specific, actionable error types that can be handled programmatically.
//!
//! Two conditions are deliberately *not* errors: an undecodable (binary)
//! content blob is a zero-hit detection outcome, and a full tie between two
//! privacy rules is resolved deterministically and logged as a warning.
//!
//! License: MIT OR Apache-2.0

use thiserror::Error;

/// This enum represents all possible error types in the `privgate-core` library.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions. This prevents them from
/// matching all variants exhaustively, thus avoiding breaking changes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PrivacyError {
    #[error("Failed to compile detector '{0}': {1}")]
    DetectorCompilation(String, regex::Error),

    #[error("Detector '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Invalid privacy rule glob '{0}': {1}")]
    InvalidGlob(String, String),

    #[error("Privacy rule {0} not found or already superseded")]
    RuleNotFound(u64),

    #[error("Invalid privacy level '{0}'")]
    InvalidLevel(String),

    #[error("Invalid owner identity '{0}'")]
    InvalidOwner(String),

    /// The audit store cannot durably append. The affected file is not yet
    /// audited and must be retried; it must never be forwarded unaudited.
    #[error("Audit storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal error in the redaction transformer. Callers default the
    /// affected file to `Blocked` (fail-closed).
    #[error("Redaction transform failed: {0}")]
    TransformFailure(String),

    #[error("Failed to serialize state: {0}")]
    Serialization(String),

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}
