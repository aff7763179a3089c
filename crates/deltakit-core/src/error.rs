// crates/deltakit-core/src/error.rs

//! Error taxonomy shared by every deltakit crate.
//!
//! Four kinds cover the whole system: malformed delta input, integrity
//! mismatch against a header digest, invalid caller arguments, and
//! allocation failure. The algorithms never truncate or drop commands
//! silently; any internal inconsistency surfaces as one of these.

use thiserror::Error;

/// Errors produced by delta construction, encoding, decoding, and apply.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// The delta byte stream is not parseable or not executable: bad magic,
    /// unknown command type, truncated record, or a command indexing outside
    /// the reference or output buffer.
    #[error("malformed delta: {0}")]
    MalformedDelta(String),

    /// A content digest embedded in the delta header does not match the
    /// recomputed digest. Suppressible at the CLI with `--ignore-hash`.
    #[error("integrity mismatch for {subject}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// What was being checked ("reference" or "output").
        subject: &'static str,
        /// Hex digest stored in the delta header.
        expected: String,
        /// Hex digest recomputed from the data.
        actual: String,
    },

    /// A caller-supplied parameter is unusable (zero seed length, oversized
    /// wire field, unknown name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation the operation cannot proceed without failed.
    #[error("out of memory allocating {0} bytes")]
    ResourceExhausted(usize),
}

impl DeltaError {
    /// Convenience constructor for [`DeltaError::IntegrityMismatch`] from raw
    /// digest bytes.
    #[must_use]
    pub fn integrity(subject: &'static str, expected: &[u8], actual: &[u8]) -> Self {
        Self::IntegrityMismatch {
            subject,
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        }
    }
}
