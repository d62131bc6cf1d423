//! Error types for the LWIR temporal codec
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! group into four categories a host can dispatch on: precondition
//! failures (programmer or configuration error), codec backend failures,
//! malformed container records, and undersized caller buffers.

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the LWIR codec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────
    // Precondition failures
    // ─────────────────────────────────────────────────────────────────────
    /// Residual encode/decode requested with no initialized reference
    #[error("no reference frame: {operation} requires a prior intra frame in the current GOP")]
    ReferenceUninitialized {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Frame dimensions don't match the reference held by the encoder/decoder
    #[error("frame dimensions {actual_w}x{actual_h} don't match reference {expected_w}x{expected_h}")]
    DimensionMismatch {
        /// Actual width
        actual_w: u32,
        /// Actual height
        actual_h: u32,
        /// Expected width
        expected_w: u32,
        /// Expected height
        expected_h: u32,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid frame passed to an encode operation
    #[error("invalid frame: {reason}")]
    InvalidFrame {
        /// Reason for invalidity
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Codec backend failures
    // ─────────────────────────────────────────────────────────────────────
    /// The still-image backend reported an encode failure
    #[error("backend encode failed: {reason}")]
    BackendEncodeFailed {
        /// Reason for failure
        reason: String,
    },

    /// The still-image backend reported a decode failure
    #[error("backend decode failed: {reason}")]
    BackendDecodeFailed {
        /// Reason for failure
        reason: String,
    },

    /// Decoded stream metadata doesn't match the container record
    #[error("decoded stream mismatch: {reason}")]
    DecodedStreamMismatch {
        /// What didn't match
        reason: String,
    },

    /// No backend registered under the requested identifier
    #[error("unknown codec backend: {id}")]
    UnknownBackend {
        /// Requested backend identifier
        id: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Malformed records
    // ─────────────────────────────────────────────────────────────────────
    /// Container record failed length, range, or field validation
    #[error("malformed record at offset {offset}: {reason}")]
    MalformedRecord {
        /// Byte offset where validation failed
        offset: usize,
        /// Reason for rejection
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Buffer errors
    // ─────────────────────────────────────────────────────────────────────
    /// Caller-provided output buffer is too small
    #[error("buffer too small: need {need}, have {have}")]
    BufferTooSmall {
        /// Required length
        need: usize,
        /// Provided length
        have: usize,
    },
}

impl Error {
    /// Create a reference-uninitialized precondition error
    pub fn no_reference(operation: &'static str) -> Self {
        Error::ReferenceUninitialized { operation }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(
        actual_w: u32,
        actual_h: u32,
        expected_w: u32,
        expected_h: u32,
    ) -> Self {
        Error::DimensionMismatch {
            actual_w,
            actual_h,
            expected_w,
            expected_h,
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid frame error
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Error::InvalidFrame {
            reason: reason.into(),
        }
    }

    /// Create a backend encode failure
    pub fn backend_encode(reason: impl Into<String>) -> Self {
        Error::BackendEncodeFailed {
            reason: reason.into(),
        }
    }

    /// Create a backend decode failure
    pub fn backend_decode(reason: impl Into<String>) -> Self {
        Error::BackendDecodeFailed {
            reason: reason.into(),
        }
    }

    /// Create a decoded stream mismatch error
    pub fn stream_mismatch(reason: impl Into<String>) -> Self {
        Error::DecodedStreamMismatch {
            reason: reason.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            offset,
            reason: reason.into(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Category checks
    // ─────────────────────────────────────────────────────────────────────

    /// True for programmer/configuration errors (retry won't help)
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            Error::ReferenceUninitialized { .. }
                | Error::DimensionMismatch { .. }
                | Error::InvalidConfig { .. }
                | Error::InvalidFrame { .. }
        )
    }

    /// True for backend errors and decoded-stream metadata mismatches
    pub fn is_codec_failure(&self) -> bool {
        matches!(
            self,
            Error::BackendEncodeFailed { .. }
                | Error::BackendDecodeFailed { .. }
                | Error::DecodedStreamMismatch { .. }
                | Error::UnknownBackend { .. }
        )
    }

    /// True for container parse/validation errors
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Error::MalformedRecord { .. })
    }

    /// True for undersized caller-provided buffers
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }
}
