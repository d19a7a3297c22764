// SPDX-License-Identifier: Apache-2.0
//! Load the OpenCL ICD loader at runtime and resolve the host API.
//!
//! The library is opened with `dlopen` (via `libloading`) and every entry
//! point listed in [`crate::ffi`] is resolved up front, so a broken
//! installation fails at load time rather than halfway through building a
//! context.

use std::ffi::{CStr, c_void};
use std::path::Path;
use std::ptr;

use libloading::{Library, Symbol};

use crate::error::{AccelError, Result};
use crate::ffi;
use crate::runtime::{
    ComputeRuntime, ContextHandle, DeviceClass, DeviceId, MemHandle, PlatformId, QueueHandle,
    RawResult,
};

/// Library names tried by [`OpenClRuntime::load_default`], in order.
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["/System/Library/Frameworks/OpenCL.framework/OpenCL"];

#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["OpenCL.dll"];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libOpenCL.so.1", "libOpenCL.so"];

// ---------------------------------------------------------------------------
// OpenCL function table
// ---------------------------------------------------------------------------

/// A loaded OpenCL library with all required entry points resolved.
///
/// The library handle is kept alive for the lifetime of this struct so the
/// loaded `.so` is not unloaded while we still hold function pointers into it.
pub struct OpenClRuntime {
    _library: Library,

    /// Path or name the library was loaded from (for diagnostics).
    library_path: String,

    // -- Discovery -----------------------------------------------------------
    fn_get_platform_ids: ffi::FnGetPlatformIds,
    fn_get_device_ids: ffi::FnGetDeviceIds,
    fn_get_device_info: ffi::FnGetDeviceInfo,

    // -- Context and queues --------------------------------------------------
    fn_create_context: ffi::FnCreateContext,
    fn_create_command_queue: ffi::FnCreateCommandQueue,
    fn_release_command_queue: ffi::FnReleaseCommandQueue,

    // -- Memory --------------------------------------------------------------
    fn_create_buffer: ffi::FnCreateBuffer,
    fn_release_mem_object: ffi::FnReleaseMemObject,
    fn_enqueue_write_buffer: ffi::FnEnqueueWriteBuffer,
    fn_enqueue_read_buffer: ffi::FnEnqueueReadBuffer,
}

impl OpenClRuntime {
    /// Load an OpenCL library and resolve all function pointers.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::LoadFailed`] if `dlopen` fails, or
    /// [`AccelError::SymbolNotFound`] if a required symbol cannot be resolved.
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();

        // SAFETY: loading an external shared library runs its initializers.
        // The caller is responsible for pointing at a trustworthy ICD loader.
        let library = unsafe { Library::new(path) }.map_err(|e| AccelError::LoadFailed {
            path: path_str.clone(),
            cause: e.to_string(),
        })?;

        tracing::info!("loaded OpenCL library '{path_str}'");

        Ok(Self {
            fn_get_platform_ids: resolve::<ffi::FnGetPlatformIds>(&library, "clGetPlatformIDs")?,
            fn_get_device_ids: resolve::<ffi::FnGetDeviceIds>(&library, "clGetDeviceIDs")?,
            fn_get_device_info: resolve::<ffi::FnGetDeviceInfo>(&library, "clGetDeviceInfo")?,
            fn_create_context: resolve::<ffi::FnCreateContext>(&library, "clCreateContext")?,
            fn_create_command_queue: resolve::<ffi::FnCreateCommandQueue>(
                &library,
                "clCreateCommandQueue",
            )?,
            fn_release_command_queue: resolve::<ffi::FnReleaseCommandQueue>(
                &library,
                "clReleaseCommandQueue",
            )?,
            fn_create_buffer: resolve::<ffi::FnCreateBuffer>(&library, "clCreateBuffer")?,
            fn_release_mem_object: resolve::<ffi::FnReleaseMemObject>(
                &library,
                "clReleaseMemObject",
            )?,
            fn_enqueue_write_buffer: resolve::<ffi::FnEnqueueWriteBuffer>(
                &library,
                "clEnqueueWriteBuffer",
            )?,
            fn_enqueue_read_buffer: resolve::<ffi::FnEnqueueReadBuffer>(
                &library,
                "clEnqueueReadBuffer",
            )?,
            _library: library,
            library_path: path_str,
        })
    }

    /// Load the system OpenCL library, trying [`DEFAULT_LIBRARY_NAMES`] in order.
    ///
    /// Returns the error for the last name tried if none of them load.
    pub fn load_default() -> Result<Self> {
        let mut last_err = AccelError::LoadFailed {
            path: DEFAULT_LIBRARY_NAMES.join(", "),
            cause: "no candidate library names".into(),
        };
        for name in DEFAULT_LIBRARY_NAMES {
            match Self::load(Path::new(name)) {
                Ok(runtime) => return Ok(runtime),
                Err(e) => {
                    tracing::debug!("could not load '{name}': {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Filesystem path or library name this runtime was loaded from.
    pub fn library_path(&self) -> &str {
        &self.library_path
    }

    /// Query a fixed-size device property into `T`.
    fn device_info_scalar<T: Copy + Default>(
        &self,
        device: DeviceId,
        param: ffi::cl_device_info,
    ) -> RawResult<T> {
        let mut value = T::default();
        let ret = unsafe {
            (self.fn_get_device_info)(
                device.0 as ffi::cl_device_id,
                param,
                std::mem::size_of::<T>(),
                (&mut value as *mut T).cast::<c_void>(),
                ptr::null_mut(),
            )
        };
        status(ret)?;
        Ok(value)
    }
}

impl std::fmt::Debug for OpenClRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClRuntime")
            .field("library_path", &self.library_path)
            .finish_non_exhaustive()
    }
}

impl ComputeRuntime for OpenClRuntime {
    fn platform_ids(&self) -> RawResult<Vec<PlatformId>> {
        let mut count: ffi::cl_uint = 0;
        let ret = unsafe { (self.fn_get_platform_ids)(0, ptr::null_mut(), &mut count) };
        // The ICD loader reports "no vendor installed" as an error code.
        if ret == ffi::CL_PLATFORM_NOT_FOUND_KHR {
            return Ok(Vec::new());
        }
        status(ret)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ids: Vec<ffi::cl_platform_id> = vec![ptr::null_mut(); count as usize];
        let ret = unsafe { (self.fn_get_platform_ids)(count, ids.as_mut_ptr(), ptr::null_mut()) };
        status(ret)?;

        Ok(ids.into_iter().map(|p| PlatformId(p as usize)).collect())
    }

    fn device_ids(&self, platform: PlatformId, class: DeviceClass) -> RawResult<Vec<DeviceId>> {
        let platform = platform.0 as ffi::cl_platform_id;
        let mut count: ffi::cl_uint = 0;
        let ret = unsafe {
            (self.fn_get_device_ids)(
                platform,
                class.to_cl_bits(),
                0,
                ptr::null_mut(),
                &mut count,
            )
        };
        if ret == ffi::CL_DEVICE_NOT_FOUND {
            return Ok(Vec::new());
        }
        status(ret)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ids: Vec<ffi::cl_device_id> = vec![ptr::null_mut(); count as usize];
        let ret = unsafe {
            (self.fn_get_device_ids)(
                platform,
                class.to_cl_bits(),
                count,
                ids.as_mut_ptr(),
                ptr::null_mut(),
            )
        };
        status(ret)?;

        Ok(ids.into_iter().map(|d| DeviceId(d as usize)).collect())
    }

    fn device_available(&self, device: DeviceId) -> RawResult<bool> {
        let available: ffi::cl_bool = self.device_info_scalar(device, ffi::CL_DEVICE_AVAILABLE)?;
        Ok(available != ffi::CL_FALSE)
    }

    fn device_name(&self, device: DeviceId) -> RawResult<String> {
        let handle = device.0 as ffi::cl_device_id;

        // Phase 1: size probe
        let mut size: usize = 0;
        let ret = unsafe {
            (self.fn_get_device_info)(handle, ffi::CL_DEVICE_NAME, 0, ptr::null_mut(), &mut size)
        };
        status(ret)?;
        if size == 0 {
            return Ok(String::new());
        }

        // Phase 2: data read
        let mut buf = vec![0u8; size];
        let ret = unsafe {
            (self.fn_get_device_info)(
                handle,
                ffi::CL_DEVICE_NAME,
                size,
                buf.as_mut_ptr().cast::<c_void>(),
                ptr::null_mut(),
            )
        };
        status(ret)?;

        let name = match CStr::from_bytes_until_nul(&buf) {
            Ok(s) => s.to_string_lossy().into_owned(),
            Err(_) => String::from_utf8_lossy(&buf).into_owned(),
        };
        Ok(name.trim().to_string())
    }

    fn create_context(&self, platform: PlatformId, device: DeviceId) -> RawResult<ContextHandle> {
        let properties: [ffi::cl_context_properties; 3] = [
            ffi::CL_CONTEXT_PLATFORM,
            platform.0 as ffi::cl_context_properties,
            0,
        ];
        let devices = [device.0 as ffi::cl_device_id];
        let mut err: ffi::cl_int = ffi::CL_SUCCESS;
        let context = unsafe {
            (self.fn_create_context)(
                properties.as_ptr(),
                1,
                devices.as_ptr(),
                None,
                ptr::null_mut(),
                &mut err,
            )
        };
        status(err)?;
        if context.is_null() {
            return Err(ffi::CL_INVALID_CONTEXT);
        }
        Ok(ContextHandle(context as usize))
    }

    fn create_queue(&self, context: ContextHandle, device: DeviceId) -> RawResult<QueueHandle> {
        let mut err: ffi::cl_int = ffi::CL_SUCCESS;
        let queue = unsafe {
            (self.fn_create_command_queue)(
                context.0 as ffi::cl_context,
                device.0 as ffi::cl_device_id,
                0,
                &mut err,
            )
        };
        status(err)?;
        if queue.is_null() {
            return Err(ffi::CL_INVALID_COMMAND_QUEUE);
        }
        Ok(QueueHandle(queue as usize))
    }

    fn release_queue(&self, queue: QueueHandle) -> RawResult<()> {
        status(unsafe { (self.fn_release_command_queue)(queue.0 as ffi::cl_command_queue) })
    }

    fn create_buffer(&self, context: ContextHandle, size: usize) -> RawResult<MemHandle> {
        let mut err: ffi::cl_int = ffi::CL_SUCCESS;
        let mem = unsafe {
            (self.fn_create_buffer)(
                context.0 as ffi::cl_context,
                ffi::CL_MEM_READ_WRITE,
                size,
                ptr::null_mut(),
                &mut err,
            )
        };
        status(err)?;
        if mem.is_null() {
            return Err(ffi::CL_INVALID_MEM_OBJECT);
        }
        Ok(MemHandle(mem as usize))
    }

    fn release_buffer(&self, buffer: MemHandle) -> RawResult<()> {
        status(unsafe { (self.fn_release_mem_object)(buffer.0 as ffi::cl_mem) })
    }

    fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        data: &[u8],
    ) -> RawResult<()> {
        // SAFETY: the write is blocking, so `data` outlives the transfer.
        status(unsafe {
            (self.fn_enqueue_write_buffer)(
                queue.0 as ffi::cl_command_queue,
                buffer.0 as ffi::cl_mem,
                ffi::CL_TRUE,
                offset,
                data.len(),
                data.as_ptr().cast::<c_void>(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })
    }

    fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        out: &mut [u8],
    ) -> RawResult<()> {
        // SAFETY: the read is blocking, so `out` outlives the transfer.
        status(unsafe {
            (self.fn_enqueue_read_buffer)(
                queue.0 as ffi::cl_command_queue,
                buffer.0 as ffi::cl_mem,
                ffi::CL_TRUE,
                offset,
                out.len(),
                out.as_mut_ptr().cast::<c_void>(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn status(code: ffi::cl_int) -> RawResult<()> {
    if ffi::is_success(code) {
        Ok(())
    } else {
        Err(code)
    }
}

/// Resolve a required symbol. Returns an error if the symbol is missing.
fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    tracing::trace!("resolving symbol '{name}'");

    // SAFETY: The caller guarantees the type `T` matches the actual function
    // signature exported by the library. This is the core FFI contract.
    unsafe {
        let sym: Symbol<T> =
            library
                .get(name.as_bytes())
                .map_err(|e| AccelError::SymbolNotFound {
                    symbol: name.to_string(),
                    cause: e.to_string(),
                })?;
        Ok(*sym)
    }
}
