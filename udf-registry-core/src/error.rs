//! Error types for UDF registry operations.

use std::io;
use thiserror::Error;

use crate::udf::UdfType;

/// The main error type for UDF registry operations.
#[derive(Debug, Error)]
pub enum UdfError {
    /// Caller-supplied argument is invalid (empty or oversized name, unsupported type).
    ///
    /// Always raised before any network activity.
    #[error("argument error: {0}")]
    Argument(String),

    /// Communication with a node failed or its response was malformed.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response arrived within the call policy's timeout.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// The node explicitly rejected the request.
    #[error("server error {code}: {message}")]
    Server {
        /// Status code reported by the node.
        code: i32,
        /// Message reported by the node.
        message: String,
    },

    /// The requested module does not exist on the contacted node.
    #[error("UDF module not found: {name} ({udf_type})")]
    NotFound {
        /// Module name.
        name: String,
        /// Module type.
        udf_type: UdfType,
    },

    /// Content fingerprint disagrees with the hash the node reported.
    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch {
        /// Hash reported by the node.
        expected: String,
        /// Hash computed from the received content.
        actual: String,
    },

    /// A chunk sequence was non-contiguous, truncated or duplicated.
    #[error("transfer integrity error: {0}")]
    TransferIntegrity(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl UdfError {
    /// Returns `true` if the failure happened below the server's decision
    /// and the same command may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UdfError::Transport(_) | UdfError::Timeout(_) | UdfError::Io(_)
        )
    }

    /// Returns `true` if the node rejected the request (including not-found).
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, UdfError::Server { .. } | UdfError::NotFound { .. })
    }
}

/// A specialized `Result` type for UDF registry operations.
pub type Result<T> = std::result::Result<T, UdfError>;
