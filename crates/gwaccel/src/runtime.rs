// SPDX-License-Identifier: Apache-2.0
//! The hardware runtime seam.
//!
//! [`ComputeRuntime`] exposes exactly the primitives the context manager
//! issues. Every method reports failure as the raw status code so that the
//! caller's [`ErrorGuard`](crate::status::ErrorGuard) decides what a failure
//! means and how it is reported.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ffi;

/// Result of a primitive hardware call. `Err` carries a non-success status code.
pub type RawResult<T> = std::result::Result<T, i32>;

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

// Handles store the raw pointer value as a `usize` so they are `Copy`, `Hash`
// and `Send`. The value is only meaningful to the runtime that issued it.

/// Opaque platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformId(pub usize);

/// Opaque device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

/// Opaque execution-context handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub usize);

/// Opaque command-queue handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueHandle(pub usize);

/// Opaque device-memory handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemHandle(pub usize);

// ---------------------------------------------------------------------------
// Device class filter
// ---------------------------------------------------------------------------

/// Which kind of device to enumerate under a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Graphics processors.
    #[default]
    Gpu,
    /// Dedicated accelerators (e.g. FPGA or DSP boards).
    Accelerator,
    /// Host processors exposed as compute devices.
    Cpu,
    /// The platform's default device type.
    Default,
    /// Every device on the platform.
    All,
}

impl DeviceClass {
    /// The `cl_device_type` bit mask for this class.
    pub fn to_cl_bits(self) -> ffi::cl_device_type {
        match self {
            DeviceClass::Gpu => ffi::CL_DEVICE_TYPE_GPU,
            DeviceClass::Accelerator => ffi::CL_DEVICE_TYPE_ACCELERATOR,
            DeviceClass::Cpu => ffi::CL_DEVICE_TYPE_CPU,
            DeviceClass::Default => ffi::CL_DEVICE_TYPE_DEFAULT,
            DeviceClass::All => ffi::CL_DEVICE_TYPE_ALL,
        }
    }

    /// Parse a class name as accepted in configuration (`gpu`, `cpu`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gpu" => Some(DeviceClass::Gpu),
            "accelerator" | "acc" => Some(DeviceClass::Accelerator),
            "cpu" => Some(DeviceClass::Cpu),
            "default" => Some(DeviceClass::Default),
            "all" => Some(DeviceClass::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Gpu => "gpu",
            DeviceClass::Accelerator => "accelerator",
            DeviceClass::Cpu => "cpu",
            DeviceClass::Default => "default",
            DeviceClass::All => "all",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Runtime trait
// ---------------------------------------------------------------------------

/// Primitive operations of an accelerator runtime.
///
/// Implementations must be safe to share between threads; individual
/// contexts never issue calls for the same context concurrently.
pub trait ComputeRuntime: Send + Sync {
    /// All platforms, in runtime order. An empty list is not an error.
    fn platform_ids(&self) -> RawResult<Vec<PlatformId>>;

    /// Devices of `class` under `platform`, in runtime order.
    fn device_ids(&self, platform: PlatformId, class: DeviceClass) -> RawResult<Vec<DeviceId>>;

    /// Whether the device currently accepts work.
    fn device_available(&self, device: DeviceId) -> RawResult<bool>;

    /// Human-readable device name.
    fn device_name(&self, device: DeviceId) -> RawResult<String>;

    /// Create an execution context bound to one device of `platform`.
    fn create_context(&self, platform: PlatformId, device: DeviceId) -> RawResult<ContextHandle>;

    /// Create an in-order command queue on `device` within `context`.
    fn create_queue(&self, context: ContextHandle, device: DeviceId) -> RawResult<QueueHandle>;

    fn release_queue(&self, queue: QueueHandle) -> RawResult<()>;

    /// Allocate `size` bytes of read-write device memory. Contents are unspecified.
    fn create_buffer(&self, context: ContextHandle, size: usize) -> RawResult<MemHandle>;

    fn release_buffer(&self, buffer: MemHandle) -> RawResult<()>;

    /// Blocking host-to-device copy of `data` into `buffer` at byte `offset`.
    fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        data: &[u8],
    ) -> RawResult<()>;

    /// Blocking device-to-host copy from `buffer` at byte `offset` into `out`.
    fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        out: &mut [u8],
    ) -> RawResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class_names() {
        for class in [
            DeviceClass::Gpu,
            DeviceClass::Accelerator,
            DeviceClass::Cpu,
            DeviceClass::Default,
            DeviceClass::All,
        ] {
            assert_eq!(DeviceClass::from_name(class.as_str()), Some(class));
        }
        assert_eq!(DeviceClass::from_name(" GPU "), Some(DeviceClass::Gpu));
        assert_eq!(DeviceClass::from_name("fpga"), None);
    }

    #[test]
    fn test_device_class_bits() {
        assert_eq!(DeviceClass::default().to_cl_bits(), ffi::CL_DEVICE_TYPE_GPU);
        assert_eq!(DeviceClass::All.to_cl_bits(), ffi::CL_DEVICE_TYPE_ALL);
    }
}
