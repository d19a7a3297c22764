// SPDX-License-Identifier: Apache-2.0
//! # gwaccel
//!
//! Accelerator context management for the gravitational-wave search
//! pipeline's OpenCL path.
//!
//! The crate discovers an OpenCL platform and an available device, builds an
//! execution context with two in-order command queues (one for kernel
//! launches, one for host/device transfers), proves the context can move
//! data with a blocking self-test, and tears everything down again. Device
//! vectors allocated under a context borrow it, so they can never outlive it.
//!
//! Every hardware call runs through an [`ErrorGuard`], which turns a failing
//! status code into a single diagnostic line and an [`AccelError`].
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────────────────┐
//!              │  matched filter / FFT    │
//!              └────────────┬─────────────┘
//!                           │ AcceleratorContext, DeviceVector
//!              ┌────────────┴─────────────┐
//!              │         gwaccel          │
//!              │                          │
//!              │  ContextBuilder          │ ← selection, rollback, self-test
//!              │  DeviceEnumerator        │ ← platform/device discovery
//!              │  ErrorGuard              │ ← status → diagnostic + error
//!              │  DeviceVector            │ ← RAII device memory
//!              └────────────┬─────────────┘
//!                           │ ComputeRuntime
//!              ┌────────────┴─────────────┐
//!              │ OpenClRuntime (dlopen)   │
//!              │ MockRuntime (in-memory)  │
//!              └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gwaccel::{AcceleratorContext, ElementKind, OpenClRuntime};
//!
//! let runtime = OpenClRuntime::load_default().expect("no OpenCL library");
//!
//! // First platform, first available GPU.
//! let ctx = AcceleratorContext::init(&runtime, None).expect("no usable GPU");
//! println!("Using {}", ctx.device_name().unwrap_or("unnamed device"));
//!
//! let mut strain = ctx
//!     .allocate_vector(ElementKind::RealSingle, 4096, 1.0 / 4096.0)
//!     .expect("allocation failed");
//! strain.fill_zero().expect("clear failed");
//! strain.release().expect("release failed");
//! ```

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod ffi;
pub mod loader;
pub mod mock;
pub mod runtime;
pub mod status;
pub mod vector;

// Re-export the most commonly used types at crate root.
pub use config::AccelConfig;
pub use context::{AcceleratorContext, ContextBuilder};
pub use device::{
    AllOf, ByIndex, ByName, DeviceCandidate, DeviceEnumerator, DeviceReport, DeviceSelector,
    FirstAvailable, PlatformReport,
};
pub use error::{AccelError, Result};
pub use loader::OpenClRuntime;
pub use mock::MockRuntime;
pub use runtime::{ComputeRuntime, DeviceClass};
pub use status::{DiagnosticSink, ErrorGuard, TracingSink, status_name};
pub use vector::{DeviceVector, ElementKind, VectorMeta};
