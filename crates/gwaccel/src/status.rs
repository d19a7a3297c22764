// SPDX-License-Identifier: Apache-2.0
//! Status-code translation and the error guard every hardware call runs through.
//!
//! A failing call produces exactly one diagnostic line of the form
//!
//! ```text
//! ERROR: <label> (<code>, <name>).
//! ```
//!
//! which is handed to a [`DiagnosticSink`]. The default sink forwards it to
//! `tracing` at error level.

use std::fmt;
use std::sync::Arc;

use crate::error::{AccelError, Result};
use crate::ffi;
use crate::runtime::RawResult;

/// Name returned for any code not in the table.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Map an OpenCL status code to its symbolic name.
///
/// Total: unrecognized codes map to [`UNKNOWN_ERROR`].
pub fn status_name(code: i32) -> &'static str {
    match code {
        ffi::CL_SUCCESS => "CL_SUCCESS",
        ffi::CL_DEVICE_NOT_FOUND => "CL_DEVICE_NOT_FOUND",
        ffi::CL_DEVICE_NOT_AVAILABLE => "CL_DEVICE_NOT_AVAILABLE",
        ffi::CL_COMPILER_NOT_AVAILABLE => "CL_COMPILER_NOT_AVAILABLE",
        ffi::CL_MEM_OBJECT_ALLOCATION_FAILURE => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
        ffi::CL_OUT_OF_RESOURCES => "CL_OUT_OF_RESOURCES",
        ffi::CL_OUT_OF_HOST_MEMORY => "CL_OUT_OF_HOST_MEMORY",
        ffi::CL_PROFILING_INFO_NOT_AVAILABLE => "CL_PROFILING_INFO_NOT_AVAILABLE",
        ffi::CL_MEM_COPY_OVERLAP => "CL_MEM_COPY_OVERLAP",
        ffi::CL_IMAGE_FORMAT_MISMATCH => "CL_IMAGE_FORMAT_MISMATCH",
        ffi::CL_IMAGE_FORMAT_NOT_SUPPORTED => "CL_IMAGE_FORMAT_NOT_SUPPORTED",
        ffi::CL_BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
        ffi::CL_MAP_FAILURE => "CL_MAP_FAILURE",
        ffi::CL_MISALIGNED_SUB_BUFFER_OFFSET => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
        ffi::CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST => {
            "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST"
        }
        ffi::CL_INVALID_VALUE => "CL_INVALID_VALUE",
        ffi::CL_INVALID_DEVICE_TYPE => "CL_INVALID_DEVICE_TYPE",
        ffi::CL_INVALID_PLATFORM => "CL_INVALID_PLATFORM",
        ffi::CL_INVALID_DEVICE => "CL_INVALID_DEVICE",
        ffi::CL_INVALID_CONTEXT => "CL_INVALID_CONTEXT",
        ffi::CL_INVALID_QUEUE_PROPERTIES => "CL_INVALID_QUEUE_PROPERTIES",
        ffi::CL_INVALID_COMMAND_QUEUE => "CL_INVALID_COMMAND_QUEUE",
        ffi::CL_INVALID_HOST_PTR => "CL_INVALID_HOST_PTR",
        ffi::CL_INVALID_MEM_OBJECT => "CL_INVALID_MEM_OBJECT",
        ffi::CL_INVALID_IMAGE_FORMAT_DESCRIPTOR => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
        ffi::CL_INVALID_IMAGE_SIZE => "CL_INVALID_IMAGE_SIZE",
        ffi::CL_INVALID_SAMPLER => "CL_INVALID_SAMPLER",
        ffi::CL_INVALID_BINARY => "CL_INVALID_BINARY",
        ffi::CL_INVALID_BUILD_OPTIONS => "CL_INVALID_BUILD_OPTIONS",
        ffi::CL_INVALID_PROGRAM => "CL_INVALID_PROGRAM",
        ffi::CL_INVALID_PROGRAM_EXECUTABLE => "CL_INVALID_PROGRAM_EXECUTABLE",
        ffi::CL_INVALID_KERNEL_NAME => "CL_INVALID_KERNEL_NAME",
        ffi::CL_INVALID_KERNEL_DEFINITION => "CL_INVALID_KERNEL_DEFINITION",
        ffi::CL_INVALID_KERNEL => "CL_INVALID_KERNEL",
        ffi::CL_INVALID_ARG_INDEX => "CL_INVALID_ARG_INDEX",
        ffi::CL_INVALID_ARG_VALUE => "CL_INVALID_ARG_VALUE",
        ffi::CL_INVALID_ARG_SIZE => "CL_INVALID_ARG_SIZE",
        ffi::CL_INVALID_KERNEL_ARGS => "CL_INVALID_KERNEL_ARGS",
        ffi::CL_INVALID_WORK_DIMENSION => "CL_INVALID_WORK_DIMENSION",
        ffi::CL_INVALID_WORK_GROUP_SIZE => "CL_INVALID_WORK_GROUP_SIZE",
        ffi::CL_INVALID_WORK_ITEM_SIZE => "CL_INVALID_WORK_ITEM_SIZE",
        ffi::CL_INVALID_GLOBAL_OFFSET => "CL_INVALID_GLOBAL_OFFSET",
        ffi::CL_INVALID_EVENT_WAIT_LIST => "CL_INVALID_EVENT_WAIT_LIST",
        ffi::CL_INVALID_EVENT => "CL_INVALID_EVENT",
        ffi::CL_INVALID_OPERATION => "CL_INVALID_OPERATION",
        ffi::CL_INVALID_GL_OBJECT => "CL_INVALID_GL_OBJECT",
        ffi::CL_INVALID_BUFFER_SIZE => "CL_INVALID_BUFFER_SIZE",
        ffi::CL_INVALID_MIP_LEVEL => "CL_INVALID_MIP_LEVEL",
        ffi::CL_INVALID_GLOBAL_WORK_SIZE => "CL_INVALID_GLOBAL_WORK_SIZE",
        ffi::CL_INVALID_PROPERTY => "CL_INVALID_PROPERTY",
        ffi::CL_PLATFORM_NOT_FOUND_KHR => "CL_PLATFORM_NOT_FOUND_KHR",
        _ => UNKNOWN_ERROR,
    }
}

/// Render the diagnostic line for a failed call.
pub fn diagnostic_line(label: &str, code: i32) -> String {
    format!("ERROR: {label} ({code}, {}).", status_name(code))
}

// ---------------------------------------------------------------------------
// Diagnostic sinks
// ---------------------------------------------------------------------------

/// Destination for failure diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Emit one complete diagnostic line.
    fn emit(&self, line: &str);
}

/// Forwards diagnostics to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::error!(target: "gwaccel::status", "{line}");
    }
}

// ---------------------------------------------------------------------------
// Error guard
// ---------------------------------------------------------------------------

/// Sole decision point for "did the last hardware call fail".
#[derive(Clone)]
pub struct ErrorGuard {
    sink: Arc<dyn DiagnosticSink>,
}

impl ErrorGuard {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Pass `code` through. On failure, emit one diagnostic line first.
    pub fn check(&self, code: i32, label: &str) -> i32 {
        if !ffi::is_success(code) {
            self.sink.emit(&diagnostic_line(label, code));
        }
        code
    }

    /// Run a runtime result through [`check`](Self::check), converting a
    /// failure code into [`AccelError::Status`].
    pub fn guard<T>(&self, result: RawResult<T>, label: &str) -> Result<T> {
        result.map_err(|code| AccelError::status(label, self.check(code, label)))
    }
}

impl Default for ErrorGuard {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for ErrorGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorGuard").finish_non_exhaustive()
    }
}
