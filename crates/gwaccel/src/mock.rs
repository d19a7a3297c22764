// SPDX-License-Identifier: Apache-2.0
//! In-memory runtime for tests and dry runs.
//!
//! [`MockRuntime`] models platforms, devices, queues and buffers without any
//! hardware. Every handle it issues is tracked, so a test can assert that no
//! queue or buffer is left live after a failed build or a teardown. Faults can
//! be injected for any primitive call.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ffi;
use crate::runtime::{
    ComputeRuntime, ContextHandle, DeviceClass, DeviceId, MemHandle, PlatformId, QueueHandle,
    RawResult,
};
use crate::status::DiagnosticSink;

/// The primitive calls of [`ComputeRuntime`], for fault injection and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeCall {
    PlatformIds,
    DeviceIds,
    DeviceAvailable,
    DeviceName,
    CreateContext,
    CreateQueue,
    ReleaseQueue,
    CreateBuffer,
    ReleaseBuffer,
    WriteBuffer,
    ReadBuffer,
}

/// A simulated device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// `None` makes the name query fail with `CL_INVALID_VALUE`.
    pub name: Option<String>,
    pub available: bool,
    pub class: DeviceClass,
}

impl MockDevice {
    pub fn available(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            available: true,
            class: DeviceClass::Gpu,
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            available: false,
            class: DeviceClass::Gpu,
        }
    }

    /// Clear the name so that the name query fails.
    pub fn without_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn with_class(mut self, class: DeviceClass) -> Self {
        self.class = class;
        self
    }
}

#[derive(Debug, Clone)]
struct Fault {
    call: RuntimeCall,
    /// Matching calls to let through before failing.
    skip: usize,
    code: i32,
}

#[derive(Debug, Default)]
struct MockState {
    platforms: Vec<(PlatformId, Vec<(DeviceId, MockDevice)>)>,
    next_handle: usize,
    contexts: HashSet<usize>,
    queues: HashSet<usize>,
    buffers: HashMap<usize, Vec<u8>>,
    faults: Vec<Fault>,
    calls: HashMap<RuntimeCall, usize>,
}

impl MockState {
    fn issue(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn device(&self, id: DeviceId) -> Option<&MockDevice> {
        self.platforms
            .iter()
            .flat_map(|(_, devices)| devices.iter())
            .find(|(d, _)| *d == id)
            .map(|(_, dev)| dev)
    }

    /// Count the call and return an injected failure code, if one is due.
    fn enter(&mut self, call: RuntimeCall) -> RawResult<()> {
        *self.calls.entry(call).or_default() += 1;
        if let Some(pos) = self.faults.iter().position(|f| f.call == call) {
            let fault = &mut self.faults[pos];
            if fault.skip == 0 {
                let code = fault.code;
                self.faults.remove(pos);
                return Err(code);
            }
            fault.skip -= 1;
        }
        Ok(())
    }
}

/// In-memory [`ComputeRuntime`].
#[derive(Debug, Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime with one platform holding two available GPUs.
    pub fn demo() -> Self {
        Self::new().with_platform([
            MockDevice::available("Mock GPU 0"),
            MockDevice::available("Mock GPU 1"),
        ])
    }

    /// Append a platform with the given devices.
    pub fn with_platform(self, devices: impl IntoIterator<Item = MockDevice>) -> Self {
        {
            let mut state = self.lock();
            let platform = PlatformId(state.issue());
            let devices: Vec<_> = devices
                .into_iter()
                .map(|dev| (DeviceId(state.issue()), dev))
                .collect();
            state.platforms.push((platform, devices));
        }
        self
    }

    /// Fail the first invocation of `call` with `code`.
    pub fn fail(self, call: RuntimeCall, code: i32) -> Self {
        self.fail_nth(call, 0, code)
    }

    /// Let `skip` invocations of `call` succeed, then fail the next with `code`.
    pub fn fail_nth(self, call: RuntimeCall, skip: usize, code: i32) -> Self {
        self.lock().faults.push(Fault { call, skip, code });
        self
    }

    pub fn platform_id(&self, platform: usize) -> Option<PlatformId> {
        self.lock().platforms.get(platform).map(|(id, _)| *id)
    }

    pub fn device_id(&self, platform: usize, device: usize) -> Option<DeviceId> {
        self.lock()
            .platforms
            .get(platform)
            .and_then(|(_, devices)| devices.get(device))
            .map(|(id, _)| *id)
    }

    /// Number of times `call` was issued, including injected failures.
    pub fn calls(&self, call: RuntimeCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn live_queues(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.lock().buffers.len()
    }

    /// Queues plus buffers still allocated.
    pub fn live_handles(&self) -> usize {
        let state = self.lock();
        state.queues.len() + state.buffers.len()
    }

    pub fn contexts_created(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Contents of a live buffer.
    pub fn buffer_contents(&self, buffer: MemHandle) -> Option<Vec<u8>> {
        self.lock().buffers.get(&buffer.0).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ComputeRuntime for MockRuntime {
    fn platform_ids(&self) -> RawResult<Vec<PlatformId>> {
        let mut state = self.lock();
        state.enter(RuntimeCall::PlatformIds)?;
        Ok(state.platforms.iter().map(|(id, _)| *id).collect())
    }

    fn device_ids(&self, platform: PlatformId, class: DeviceClass) -> RawResult<Vec<DeviceId>> {
        let mut state = self.lock();
        state.enter(RuntimeCall::DeviceIds)?;
        let (_, devices) = state
            .platforms
            .iter()
            .find(|(id, _)| *id == platform)
            .ok_or(ffi::CL_INVALID_PLATFORM)?;
        Ok(devices
            .iter()
            .filter(|(_, dev)| {
                matches!(class, DeviceClass::All | DeviceClass::Default) || dev.class == class
            })
            .map(|(id, _)| *id)
            .collect())
    }

    fn device_available(&self, device: DeviceId) -> RawResult<bool> {
        let mut state = self.lock();
        state.enter(RuntimeCall::DeviceAvailable)?;
        state
            .device(device)
            .map(|dev| dev.available)
            .ok_or(ffi::CL_INVALID_DEVICE)
    }

    fn device_name(&self, device: DeviceId) -> RawResult<String> {
        let mut state = self.lock();
        state.enter(RuntimeCall::DeviceName)?;
        let dev = state.device(device).ok_or(ffi::CL_INVALID_DEVICE)?;
        dev.name.clone().ok_or(ffi::CL_INVALID_VALUE)
    }

    fn create_context(&self, platform: PlatformId, device: DeviceId) -> RawResult<ContextHandle> {
        let mut state = self.lock();
        state.enter(RuntimeCall::CreateContext)?;
        let owned = state
            .platforms
            .iter()
            .any(|(p, devices)| *p == platform && devices.iter().any(|(d, _)| *d == device));
        if !owned {
            return Err(ffi::CL_INVALID_DEVICE);
        }
        if !state.device(device).is_some_and(|dev| dev.available) {
            return Err(ffi::CL_DEVICE_NOT_AVAILABLE);
        }
        let handle = state.issue();
        state.contexts.insert(handle);
        Ok(ContextHandle(handle))
    }

    fn create_queue(&self, context: ContextHandle, device: DeviceId) -> RawResult<QueueHandle> {
        let mut state = self.lock();
        state.enter(RuntimeCall::CreateQueue)?;
        if !state.contexts.contains(&context.0) {
            return Err(ffi::CL_INVALID_CONTEXT);
        }
        if state.device(device).is_none() {
            return Err(ffi::CL_INVALID_DEVICE);
        }
        let handle = state.issue();
        state.queues.insert(handle);
        Ok(QueueHandle(handle))
    }

    fn release_queue(&self, queue: QueueHandle) -> RawResult<()> {
        let mut state = self.lock();
        state.enter(RuntimeCall::ReleaseQueue)?;
        if state.queues.remove(&queue.0) {
            Ok(())
        } else {
            Err(ffi::CL_INVALID_COMMAND_QUEUE)
        }
    }

    fn create_buffer(&self, context: ContextHandle, size: usize) -> RawResult<MemHandle> {
        let mut state = self.lock();
        state.enter(RuntimeCall::CreateBuffer)?;
        if !state.contexts.contains(&context.0) {
            return Err(ffi::CL_INVALID_CONTEXT);
        }
        if size == 0 {
            return Err(ffi::CL_INVALID_BUFFER_SIZE);
        }
        let handle = state.issue();
        // Real allocations are not zeroed; fill with a marker so tests notice.
        state.buffers.insert(handle, vec![0xA5; size]);
        Ok(MemHandle(handle))
    }

    fn release_buffer(&self, buffer: MemHandle) -> RawResult<()> {
        let mut state = self.lock();
        state.enter(RuntimeCall::ReleaseBuffer)?;
        match state.buffers.remove(&buffer.0) {
            Some(_) => Ok(()),
            None => Err(ffi::CL_INVALID_MEM_OBJECT),
        }
    }

    fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        data: &[u8],
    ) -> RawResult<()> {
        let mut state = self.lock();
        state.enter(RuntimeCall::WriteBuffer)?;
        if !state.queues.contains(&queue.0) {
            return Err(ffi::CL_INVALID_COMMAND_QUEUE);
        }
        let contents = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(ffi::CL_INVALID_MEM_OBJECT)?;
        let end = offset.checked_add(data.len()).ok_or(ffi::CL_INVALID_VALUE)?;
        let target = contents.get_mut(offset..end).ok_or(ffi::CL_INVALID_VALUE)?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        out: &mut [u8],
    ) -> RawResult<()> {
        let mut state = self.lock();
        state.enter(RuntimeCall::ReadBuffer)?;
        if !state.queues.contains(&queue.0) {
            return Err(ffi::CL_INVALID_COMMAND_QUEUE);
        }
        let contents = state
            .buffers
            .get(&buffer.0)
            .ok_or(ffi::CL_INVALID_MEM_OBJECT)?;
        let end = offset.checked_add(out.len()).ok_or(ffi::CL_INVALID_VALUE)?;
        let source = contents.get(offset..end).ok_or(ffi::CL_INVALID_VALUE)?;
        out.copy_from_slice(source);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

/// A [`DiagnosticSink`] that keeps every line it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_fires_once_after_skips() {
        let rt = MockRuntime::demo().fail_nth(RuntimeCall::PlatformIds, 1, ffi::CL_OUT_OF_RESOURCES);
        assert!(rt.platform_ids().is_ok());
        assert_eq!(rt.platform_ids(), Err(ffi::CL_OUT_OF_RESOURCES));
        assert!(rt.platform_ids().is_ok());
        assert_eq!(rt.calls(RuntimeCall::PlatformIds), 3);
    }

    #[test]
    fn test_device_class_filter() {
        let rt = MockRuntime::new().with_platform([
            MockDevice::available("gpu"),
            MockDevice::available("cpu").with_class(DeviceClass::Cpu),
        ]);
        let p = rt.platform_id(0).unwrap();
        assert_eq!(rt.device_ids(p, DeviceClass::Gpu).unwrap().len(), 1);
        assert_eq!(rt.device_ids(p, DeviceClass::All).unwrap().len(), 2);
        assert!(rt.device_ids(p, DeviceClass::Accelerator).unwrap().is_empty());
    }

    #[test]
    fn test_double_release_is_rejected() {
        let rt = MockRuntime::demo();
        let p = rt.platform_id(0).unwrap();
        let d = rt.device_id(0, 0).unwrap();
        let ctx = rt.create_context(p, d).unwrap();
        let buf = rt.create_buffer(ctx, 16).unwrap();
        assert_eq!(rt.live_buffers(), 1);
        assert!(rt.release_buffer(buf).is_ok());
        assert_eq!(rt.release_buffer(buf), Err(ffi::CL_INVALID_MEM_OBJECT));
        assert_eq!(rt.live_buffers(), 0);
    }
}
