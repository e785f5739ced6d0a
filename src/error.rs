//! Error types for tesela
//!
//! All fallible operations return [`Result`]. The taxonomy mirrors the three
//! failure classes of the kernel core:
//!
//! - precondition failures caught before a launch ([`TeselaError::InvalidShape`],
//!   [`TeselaError::DeviceIndexOutOfRange`])
//! - faults surfaced while a launch executes ([`TeselaError::ExecutionFault`])
//! - submission to a torn-down context ([`TeselaError::QueueClosed`])
//!
//! No operation retries internally; every failure propagates to the caller at
//! the point of the failing call or through the launch's completion handle.

use thiserror::Error;

/// Result type alias for tesela operations
pub type Result<T> = std::result::Result<T, TeselaError>;

/// Error type for all tesela operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeselaError {
    /// Requested device index exceeds the enumerated device count.
    ///
    /// Only the strict constructor ([`crate::queue::Context::new`]) reports
    /// this; [`crate::queue::create_context`] clamps to device 0 instead.
    #[error("device index {requested} out of range: {available} device(s) enumerated")]
    DeviceIndexOutOfRange {
        /// Index the caller asked for
        requested: usize,
        /// Number of devices actually enumerated
        available: usize,
    },

    /// Matrix shape or buffer length violates a kernel precondition.
    ///
    /// Raised before submission: M, N, K must be positive exact multiples of
    /// the tile dimensions, and buffer lengths must match the row-major
    /// layouts. The output buffer is untouched when this is returned.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Human-readable description of the violated precondition
        reason: String,
    },

    /// A launch failed while executing on the device.
    ///
    /// Propagated through [`crate::queue::CompletionHandle::wait`]. A failed
    /// launch invalidates the entire output region it was responsible for;
    /// there are no partial-completion semantics.
    #[error("execution fault in {operation}: {reason}")]
    ExecutionFault {
        /// Operation that faulted (e.g. `"gemm_f16"`)
        operation: String,
        /// Lower-level failure description
        reason: String,
    },

    /// The context's command processor has shut down.
    ///
    /// Returned when submitting to (or waiting on) a context whose scheduler
    /// thread is gone, instead of hanging forever.
    #[error("command queue closed")]
    QueueClosed,
}
