// SPDX-License-Identifier: Apache-2.0
//! Accelerator context construction and teardown.
//!
//! [`ContextBuilder`] runs the construction protocol:
//!
//! 1. enumerate platforms and pick one,
//! 2. pick the first available device the selector accepts,
//! 3. create an execution context bound to that device,
//! 4. create the kernel queue,
//! 5. create the I/O queue,
//! 6. self-test: allocate a single-precision device buffer and push a host
//!    scratch buffer into it with one blocking transfer,
//! 7. release the self-test buffers and hand back the context.
//!
//! Any failure short-circuits to [`AcceleratorContext::destroy`] before the
//! error is returned, so a failed build never leaves a queue or buffer alive.

use std::fmt;
use std::sync::Arc;

use crate::config::AccelConfig;
use crate::device::{AllOf, ByIndex, ByName, DeviceEnumerator, DeviceSelector, FirstAvailable};
use crate::error::{AccelError, Result};
use crate::runtime::{ComputeRuntime, ContextHandle, DeviceClass, DeviceId, PlatformId, QueueHandle};
use crate::status::{DiagnosticSink, ErrorGuard};
use crate::vector::{DeviceVector, ElementKind};

/// Number of single-precision elements moved by the construction self-test.
pub const DEFAULT_SELF_TEST_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// A usable compute environment bound to one device.
///
/// Owns the two command queues it created. The execution context handle and
/// the platform/device identifiers belong to the runtime and are never
/// released here.
pub struct AcceleratorContext<'rt> {
    runtime: &'rt dyn ComputeRuntime,
    guard: ErrorGuard,
    platform: Option<PlatformId>,
    device: Option<DeviceId>,
    device_name: Option<String>,
    context: Option<ContextHandle>,
    kernel_queue: Option<QueueHandle>,
    io_queue: Option<QueueHandle>,
}

impl<'rt> AcceleratorContext<'rt> {
    /// Build a context on the first platform. `device_index` restricts the
    /// choice to that enumeration index; `None` takes the first available
    /// device.
    pub fn init(runtime: &'rt dyn ComputeRuntime, device_index: Option<usize>) -> Result<Self> {
        let builder = ContextBuilder::new(runtime);
        match device_index {
            Some(index) => builder.selector(ByIndex(index)).build(),
            None => builder.build(),
        }
    }

    fn empty(runtime: &'rt dyn ComputeRuntime, guard: ErrorGuard) -> Self {
        Self {
            runtime,
            guard,
            platform: None,
            device: None,
            device_name: None,
            context: None,
            kernel_queue: None,
            io_queue: None,
        }
    }

    pub fn runtime(&self) -> &'rt dyn ComputeRuntime {
        self.runtime
    }

    pub fn guard(&self) -> &ErrorGuard {
        &self.guard
    }

    pub fn platform(&self) -> Option<PlatformId> {
        self.platform
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// The execution context handle.
    pub fn handle(&self) -> Option<ContextHandle> {
        self.context
    }

    /// Queue for kernel launches.
    pub fn kernel_queue(&self) -> Option<QueueHandle> {
        self.kernel_queue
    }

    /// Queue for host/device transfers.
    pub fn io_queue(&self) -> Option<QueueHandle> {
        self.io_queue
    }

    /// Whether both queues are still held.
    pub fn is_live(&self) -> bool {
        self.kernel_queue.is_some() && self.io_queue.is_some()
    }

    /// Allocate a vector under this context.
    pub fn allocate_vector<'ctx>(
        &'ctx self,
        kind: ElementKind,
        length: usize,
        delta_x: f64,
    ) -> Result<DeviceVector<'ctx>>
    where
        'rt: 'ctx,
    {
        DeviceVector::allocate(self, kind, length, delta_x)
    }

    /// Release the kernel queue, then the I/O queue.
    ///
    /// Each release is attempted even if the other fails; the first failure
    /// is returned. Safe to call any number of times.
    pub fn destroy(&mut self) -> Result<()> {
        let kernel = match self.kernel_queue.take() {
            Some(q) => self
                .guard
                .guard(self.runtime.release_queue(q), "Releasing kernel queue"),
            None => Ok(()),
        };
        let io = match self.io_queue.take() {
            Some(q) => self
                .guard
                .guard(self.runtime.release_queue(q), "Releasing IO queue"),
            None => Ok(()),
        };
        tracing::debug!("context queues released");
        kernel.and(io)
    }
}

impl Drop for AcceleratorContext<'_> {
    fn drop(&mut self) {
        if self.kernel_queue.is_some() || self.io_queue.is_some() {
            let _ = self.destroy();
        }
    }
}

impl fmt::Debug for AcceleratorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceleratorContext")
            .field("platform", &self.platform)
            .field("device", &self.device)
            .field("device_name", &self.device_name)
            .field("context", &self.context)
            .field("kernel_queue", &self.kernel_queue)
            .field("io_queue", &self.io_queue)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and runs context construction.
pub struct ContextBuilder<'rt> {
    runtime: &'rt dyn ComputeRuntime,
    platform_index: usize,
    device_class: DeviceClass,
    selector: Box<dyn DeviceSelector + Send + Sync>,
    guard: ErrorGuard,
    self_test_len: usize,
}

impl<'rt> ContextBuilder<'rt> {
    /// First platform, first available GPU, diagnostics to `tracing`.
    pub fn new(runtime: &'rt dyn ComputeRuntime) -> Self {
        Self {
            runtime,
            platform_index: 0,
            device_class: DeviceClass::Gpu,
            selector: Box::new(FirstAvailable),
            guard: ErrorGuard::default(),
            self_test_len: DEFAULT_SELF_TEST_LEN,
        }
    }

    /// Builder preloaded from a validated [`AccelConfig`].
    pub fn from_config(runtime: &'rt dyn ComputeRuntime, config: &AccelConfig) -> Self {
        let mut selector = AllOf::new();
        if let Some(index) = config.device_index {
            selector = selector.with(ByIndex(index));
        }
        if let Some(name) = &config.device_name {
            selector = selector.with(ByName(name.clone()));
        }

        let builder = Self::new(runtime)
            .platform_index(config.platform_index)
            .device_class(config.device_class)
            .self_test_len(config.self_test_len);
        if selector.is_empty() {
            builder
        } else {
            builder.selector(selector)
        }
    }

    pub fn platform_index(mut self, index: usize) -> Self {
        self.platform_index = index;
        self
    }

    pub fn device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = class;
        self
    }

    pub fn selector(mut self, selector: impl DeviceSelector + Send + Sync + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Route diagnostic lines to `sink` instead of `tracing`.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.guard = ErrorGuard::new(sink);
        self
    }

    /// Number of elements moved by the self-test. Must be non-zero.
    pub fn self_test_len(mut self, len: usize) -> Self {
        self.self_test_len = len;
        self
    }

    /// Run construction. On failure everything acquired so far has been
    /// released by the time the error is returned.
    pub fn build(self) -> Result<AcceleratorContext<'rt>> {
        if self.self_test_len == 0 {
            return Err(AccelError::Config(
                "self-test length must be greater than zero".into(),
            ));
        }

        let mut ctx = AcceleratorContext::empty(self.runtime, self.guard.clone());
        match self.populate(&mut ctx) {
            Ok(()) => {
                tracing::info!(
                    "accelerator context ready on '{}'",
                    ctx.device_name().unwrap_or("unnamed device")
                );
                Ok(ctx)
            }
            Err(e) => {
                tracing::debug!("context construction failed, tearing down: {e}");
                // The originating failure wins over any teardown failure.
                let _ = ctx.destroy();
                Err(e)
            }
        }
    }

    fn populate(&self, ctx: &mut AcceleratorContext<'rt>) -> Result<()> {
        let enumerator = DeviceEnumerator::new(self.runtime, &self.guard);

        let platform = enumerator.select_platform(self.platform_index)?;
        ctx.platform = Some(platform);

        let candidate =
            enumerator.select_device(platform, self.device_class, self.selector.as_ref())?;
        ctx.device = Some(candidate.id);
        ctx.device_name = Some(candidate.name);

        let handle = self.guard.guard(
            self.runtime.create_context(platform, candidate.id),
            "Creating context",
        )?;
        ctx.context = Some(handle);
        tracing::debug!("execution context created");

        ctx.kernel_queue = Some(self.guard.guard(
            self.runtime.create_queue(handle, candidate.id),
            "Creating kernel queue",
        )?);
        ctx.io_queue = Some(self.guard.guard(
            self.runtime.create_queue(handle, candidate.id),
            "Creating IO queue",
        )?);
        tracing::debug!("kernel and IO queues created");

        self_test(ctx, self.self_test_len)
    }
}

impl fmt::Debug for ContextBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("platform_index", &self.platform_index)
            .field("device_class", &self.device_class)
            .field("self_test_len", &self.self_test_len)
            .finish_non_exhaustive()
    }
}

/// Push `len` zeroed floats to the device through the I/O queue. Both
/// buffers are released whether or not the transfer succeeds.
fn self_test(ctx: &AcceleratorContext<'_>, len: usize) -> Result<()> {
    let scratch = vec![0.0f32; len];
    let mut probe = DeviceVector::allocate(ctx, ElementKind::RealSingle, len, 1.0)?;
    let written = probe.upload(&scratch);
    let released = probe.release();
    written?;
    released?;
    tracing::debug!("self-test transferred {len} elements");
    Ok(())
}
