// SPDX-License-Identifier: Apache-2.0
//! Raw FFI constants and type definitions for the OpenCL 1.2 host API.
//!
//! These values must match the Khronos `CL/cl.h` header definitions.
//!
//! Nothing here is linked statically: the entry points are resolved at
//! runtime from the ICD loader shared library by [`crate::loader`], so a
//! missing OpenCL installation is a recoverable error rather than a link
//! failure.

#![allow(non_camel_case_types)]

use std::ffi::c_void;
use std::os::raw::c_char;

// ===========================================================================
// Scalar aliases
// ===========================================================================

pub type cl_int = i32;
pub type cl_uint = u32;
pub type cl_ulong = u64;
pub type cl_bool = cl_uint;
pub type cl_bitfield = cl_ulong;
pub type cl_device_type = cl_bitfield;
pub type cl_device_info = cl_uint;
pub type cl_command_queue_properties = cl_bitfield;
pub type cl_mem_flags = cl_bitfield;
pub type cl_context_properties = isize;

// ===========================================================================
// Opaque handle types
// ===========================================================================

/// Opaque platform handle (`cl_platform_id`).
pub type cl_platform_id = *mut c_void;

/// Opaque device handle (`cl_device_id`).
pub type cl_device_id = *mut c_void;

/// Opaque execution context handle (`cl_context`).
pub type cl_context = *mut c_void;

/// Opaque command queue handle (`cl_command_queue`).
pub type cl_command_queue = *mut c_void;

/// Opaque memory object handle (`cl_mem`).
pub type cl_mem = *mut c_void;

/// Opaque event handle (`cl_event`).
pub type cl_event = *mut c_void;

// ===========================================================================
// Status codes
// ===========================================================================

pub const CL_SUCCESS: cl_int = 0;
pub const CL_DEVICE_NOT_FOUND: cl_int = -1;
pub const CL_DEVICE_NOT_AVAILABLE: cl_int = -2;
pub const CL_COMPILER_NOT_AVAILABLE: cl_int = -3;
pub const CL_MEM_OBJECT_ALLOCATION_FAILURE: cl_int = -4;
pub const CL_OUT_OF_RESOURCES: cl_int = -5;
pub const CL_OUT_OF_HOST_MEMORY: cl_int = -6;
pub const CL_PROFILING_INFO_NOT_AVAILABLE: cl_int = -7;
pub const CL_MEM_COPY_OVERLAP: cl_int = -8;
pub const CL_IMAGE_FORMAT_MISMATCH: cl_int = -9;
pub const CL_IMAGE_FORMAT_NOT_SUPPORTED: cl_int = -10;
pub const CL_BUILD_PROGRAM_FAILURE: cl_int = -11;
pub const CL_MAP_FAILURE: cl_int = -12;
pub const CL_MISALIGNED_SUB_BUFFER_OFFSET: cl_int = -13;
pub const CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST: cl_int = -14;

pub const CL_INVALID_VALUE: cl_int = -30;
pub const CL_INVALID_DEVICE_TYPE: cl_int = -31;
pub const CL_INVALID_PLATFORM: cl_int = -32;
pub const CL_INVALID_DEVICE: cl_int = -33;
pub const CL_INVALID_CONTEXT: cl_int = -34;
pub const CL_INVALID_QUEUE_PROPERTIES: cl_int = -35;
pub const CL_INVALID_COMMAND_QUEUE: cl_int = -36;
pub const CL_INVALID_HOST_PTR: cl_int = -37;
pub const CL_INVALID_MEM_OBJECT: cl_int = -38;
pub const CL_INVALID_IMAGE_FORMAT_DESCRIPTOR: cl_int = -39;
pub const CL_INVALID_IMAGE_SIZE: cl_int = -40;
pub const CL_INVALID_SAMPLER: cl_int = -41;
pub const CL_INVALID_BINARY: cl_int = -42;
pub const CL_INVALID_BUILD_OPTIONS: cl_int = -43;
pub const CL_INVALID_PROGRAM: cl_int = -44;
pub const CL_INVALID_PROGRAM_EXECUTABLE: cl_int = -45;
pub const CL_INVALID_KERNEL_NAME: cl_int = -46;
pub const CL_INVALID_KERNEL_DEFINITION: cl_int = -47;
pub const CL_INVALID_KERNEL: cl_int = -48;
pub const CL_INVALID_ARG_INDEX: cl_int = -49;
pub const CL_INVALID_ARG_VALUE: cl_int = -50;
pub const CL_INVALID_ARG_SIZE: cl_int = -51;
pub const CL_INVALID_KERNEL_ARGS: cl_int = -52;
pub const CL_INVALID_WORK_DIMENSION: cl_int = -53;
pub const CL_INVALID_WORK_GROUP_SIZE: cl_int = -54;
pub const CL_INVALID_WORK_ITEM_SIZE: cl_int = -55;
pub const CL_INVALID_GLOBAL_OFFSET: cl_int = -56;
pub const CL_INVALID_EVENT_WAIT_LIST: cl_int = -57;
pub const CL_INVALID_EVENT: cl_int = -58;
pub const CL_INVALID_OPERATION: cl_int = -59;
pub const CL_INVALID_GL_OBJECT: cl_int = -60;
pub const CL_INVALID_BUFFER_SIZE: cl_int = -61;
pub const CL_INVALID_MIP_LEVEL: cl_int = -62;
pub const CL_INVALID_GLOBAL_WORK_SIZE: cl_int = -63;
pub const CL_INVALID_PROPERTY: cl_int = -64;

/// Returned by the ICD loader (`cl_khr_icd`) when no vendor platform is installed.
pub const CL_PLATFORM_NOT_FOUND_KHR: cl_int = -1001;

/// Returns `true` if the OpenCL return code indicates success.
#[inline]
pub fn is_success(code: cl_int) -> bool {
    code == CL_SUCCESS
}

// ===========================================================================
// Booleans
// ===========================================================================

pub const CL_FALSE: cl_bool = 0;
pub const CL_TRUE: cl_bool = 1;

// ===========================================================================
// Device types (cl_device_type)
// ===========================================================================

pub const CL_DEVICE_TYPE_DEFAULT: cl_device_type = 1 << 0;
pub const CL_DEVICE_TYPE_CPU: cl_device_type = 1 << 1;
pub const CL_DEVICE_TYPE_GPU: cl_device_type = 1 << 2;
pub const CL_DEVICE_TYPE_ACCELERATOR: cl_device_type = 1 << 3;
pub const CL_DEVICE_TYPE_ALL: cl_device_type = 0xFFFF_FFFF;

// ===========================================================================
// Device info keys (cl_device_info)
// ===========================================================================

pub const CL_DEVICE_AVAILABLE: cl_device_info = 0x1027;
pub const CL_DEVICE_NAME: cl_device_info = 0x102B;

// ===========================================================================
// Context properties
// ===========================================================================

pub const CL_CONTEXT_PLATFORM: cl_context_properties = 0x1084;

// ===========================================================================
// Memory flags (cl_mem_flags)
// ===========================================================================

pub const CL_MEM_READ_WRITE: cl_mem_flags = 1 << 0;

// ===========================================================================
// Function pointer types
//
// The ten entry points the context manager needs:
//   clGetPlatformIDs
//   clGetDeviceIDs
//   clGetDeviceInfo
//   clCreateContext
//   clCreateCommandQueue
//   clReleaseCommandQueue
//   clCreateBuffer
//   clReleaseMemObject
//   clEnqueueWriteBuffer
//   clEnqueueReadBuffer
// ===========================================================================

// -- Discovery (3) ----------------------------------------------------------

/// `cl_int clGetPlatformIDs(num_entries, platforms, num_platforms)`
pub type FnGetPlatformIds = unsafe extern "C" fn(
    num_entries: cl_uint,
    platforms: *mut cl_platform_id,
    num_platforms: *mut cl_uint,
) -> cl_int;

/// `cl_int clGetDeviceIDs(platform, device_type, num_entries, devices, num_devices)`
pub type FnGetDeviceIds = unsafe extern "C" fn(
    platform: cl_platform_id,
    device_type: cl_device_type,
    num_entries: cl_uint,
    devices: *mut cl_device_id,
    num_devices: *mut cl_uint,
) -> cl_int;

/// `cl_int clGetDeviceInfo(device, param_name, param_value_size, param_value, param_value_size_ret)`
pub type FnGetDeviceInfo = unsafe extern "C" fn(
    device: cl_device_id,
    param_name: cl_device_info,
    param_value_size: usize,
    param_value: *mut c_void,
    param_value_size_ret: *mut usize,
) -> cl_int;

// -- Context and queues (3) -------------------------------------------------

/// Context error callback (`pfn_notify`).
pub type FnContextNotify = unsafe extern "C" fn(
    errinfo: *const c_char,
    private_info: *const c_void,
    cb: usize,
    user_data: *mut c_void,
);

/// `cl_context clCreateContext(properties, num_devices, devices, pfn_notify, user_data, errcode_ret)`
pub type FnCreateContext = unsafe extern "C" fn(
    properties: *const cl_context_properties,
    num_devices: cl_uint,
    devices: *const cl_device_id,
    pfn_notify: Option<FnContextNotify>,
    user_data: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_context;

/// `cl_command_queue clCreateCommandQueue(context, device, properties, errcode_ret)`
pub type FnCreateCommandQueue = unsafe extern "C" fn(
    context: cl_context,
    device: cl_device_id,
    properties: cl_command_queue_properties,
    errcode_ret: *mut cl_int,
) -> cl_command_queue;

/// `cl_int clReleaseCommandQueue(command_queue)`
pub type FnReleaseCommandQueue = unsafe extern "C" fn(command_queue: cl_command_queue) -> cl_int;

// -- Memory objects and transfers (4) ---------------------------------------

/// `cl_mem clCreateBuffer(context, flags, size, host_ptr, errcode_ret)`
pub type FnCreateBuffer = unsafe extern "C" fn(
    context: cl_context,
    flags: cl_mem_flags,
    size: usize,
    host_ptr: *mut c_void,
    errcode_ret: *mut cl_int,
) -> cl_mem;

/// `cl_int clReleaseMemObject(memobj)`
pub type FnReleaseMemObject = unsafe extern "C" fn(memobj: cl_mem) -> cl_int;

/// `cl_int clEnqueueWriteBuffer(queue, buffer, blocking, offset, size, ptr, num_events, wait_list, event)`
pub type FnEnqueueWriteBuffer = unsafe extern "C" fn(
    command_queue: cl_command_queue,
    buffer: cl_mem,
    blocking_write: cl_bool,
    offset: usize,
    size: usize,
    ptr: *const c_void,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int;

/// `cl_int clEnqueueReadBuffer(queue, buffer, blocking, offset, size, ptr, num_events, wait_list, event)`
pub type FnEnqueueReadBuffer = unsafe extern "C" fn(
    command_queue: cl_command_queue,
    buffer: cl_mem,
    blocking_read: cl_bool,
    offset: usize,
    size: usize,
    ptr: *mut c_void,
    num_events_in_wait_list: cl_uint,
    event_wait_list: *const cl_event,
    event: *mut cl_event,
) -> cl_int;
