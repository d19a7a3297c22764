// SPDX-License-Identifier: Apache-2.0
//! Error types for accelerator context management.

use crate::status;
use crate::vector::ElementKind;

/// Errors arising from accelerator discovery, context construction and
/// device memory operations.
#[derive(Debug, thiserror::Error)]
pub enum AccelError {
    /// A hardware call returned a non-success status code.
    #[error("{label} ({code}, {name})")]
    Status {
        label: String,
        code: i32,
        name: &'static str,
    },

    /// No platform, or no available device on the selected platform.
    #[error("no accelerator available: {0}")]
    NoAcceleratorAvailable(String),

    #[error("failed to load OpenCL library at '{path}': {cause}")]
    LoadFailed { path: String, cause: String },

    #[error("symbol '{symbol}' not found in OpenCL library: {cause}")]
    SymbolNotFound { symbol: String, cause: String },

    #[error("element kind mismatch: vector holds {expected}, host data is {actual}")]
    KindMismatch {
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("length mismatch: vector holds {expected} elements, host data has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccelError {
    /// Build a [`AccelError::Status`] from a raw status code.
    pub fn status(label: impl Into<String>, code: i32) -> Self {
        AccelError::Status {
            label: label.into(),
            code,
            name: status::status_name(code),
        }
    }

    /// The hardware status code carried by this error, if any.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            AccelError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error means "no usable accelerator" rather than a failing
    /// hardware call. Callers typically fall back to the host path on this.
    pub fn is_no_accelerator(&self) -> bool {
        matches!(self, AccelError::NoAcceleratorAvailable(_))
    }
}

pub type Result<T> = std::result::Result<T, AccelError>;
