// SPDX-License-Identifier: Apache-2.0
//! Context construction, rollback and teardown against the in-memory runtime.

use std::sync::Arc;

use gwaccel::mock::{MockDevice, MockRuntime, RecordingSink, RuntimeCall};
use gwaccel::{AccelError, AcceleratorContext, ByName, ContextBuilder, DeviceClass, ffi};

fn build_recorded(rt: &MockRuntime) -> (Result<AcceleratorContext<'_>, AccelError>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let result = ContextBuilder::new(rt).diagnostics(sink.clone()).build();
    (result, sink)
}

// ---------------------------------------------------------------------------
// Successful construction
// ---------------------------------------------------------------------------

#[test]
fn test_build_populates_every_handle() {
    let rt = MockRuntime::demo();
    let (ctx, sink) = build_recorded(&rt);
    let ctx = ctx.expect("build failed");

    assert_eq!(ctx.platform(), rt.platform_id(0));
    assert_eq!(ctx.device(), rt.device_id(0, 0));
    assert!(ctx.handle().is_some());
    assert!(ctx.kernel_queue().is_some());
    assert!(ctx.io_queue().is_some());
    assert!(ctx.is_live());
    assert!(sink.lines().is_empty());

    // Self-test: one allocation, one blocking write, one release.
    assert_eq!(rt.calls(RuntimeCall::CreateBuffer), 1);
    assert_eq!(rt.calls(RuntimeCall::WriteBuffer), 1);
    assert_eq!(rt.calls(RuntimeCall::ReleaseBuffer), 1);
    assert_eq!(rt.live_buffers(), 0);
}

#[test]
fn test_skips_unavailable_first_device() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::unavailable("Busy GPU"),
        MockDevice::available("Idle GPU"),
    ]);
    let ctx = AcceleratorContext::init(&rt, None).expect("build failed");
    assert_eq!(ctx.device(), rt.device_id(0, 1));
    assert_eq!(ctx.device_name(), Some("Idle GPU"));
}

#[test]
fn test_unnamed_unavailable_device_is_tolerated() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::unavailable("ghost").without_name(),
        MockDevice::available("Idle GPU"),
    ]);
    let (ctx, sink) = build_recorded(&rt);
    assert_eq!(ctx.expect("build failed").device(), rt.device_id(0, 1));
    assert!(sink.lines().is_empty());
}

#[test]
fn test_second_platform_by_index() {
    let rt = MockRuntime::demo().with_platform([MockDevice::available("Other vendor GPU")]);
    let ctx = ContextBuilder::new(&rt).platform_index(1).build().unwrap();
    assert_eq!(ctx.platform(), rt.platform_id(1));
    assert_eq!(ctx.device_name(), Some("Other vendor GPU"));
}

#[test]
fn test_device_class_filter() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::available("Host CPU").with_class(DeviceClass::Cpu),
    ]);
    let err = ContextBuilder::new(&rt).build().unwrap_err();
    assert!(err.is_no_accelerator());

    let ctx = ContextBuilder::new(&rt)
        .device_class(DeviceClass::Cpu)
        .build()
        .unwrap();
    assert_eq!(ctx.device_name(), Some("Host CPU"));
}

#[test]
fn test_selector_by_name() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::available("Radeon Pro W6800"),
        MockDevice::available("Tesla V100"),
    ]);
    let ctx = ContextBuilder::new(&rt)
        .selector(ByName("v100".into()))
        .build()
        .unwrap();
    assert_eq!(ctx.device(), rt.device_id(0, 1));
}

#[test]
fn test_closure_selector() {
    let rt = MockRuntime::demo();
    let ctx = ContextBuilder::new(&rt)
        .selector(|c: &gwaccel::DeviceCandidate| c.name.ends_with('1'))
        .build()
        .unwrap();
    assert_eq!(ctx.device_name(), Some("Mock GPU 1"));
}

#[test]
fn test_two_contexts_coexist() {
    let rt = MockRuntime::demo();
    let a = AcceleratorContext::init(&rt, Some(0)).unwrap();
    let mut b = AcceleratorContext::init(&rt, Some(1)).unwrap();

    assert_ne!(a.device(), b.device());
    assert_ne!(a.io_queue(), b.io_queue());
    assert_eq!(rt.live_queues(), 4);

    b.destroy().unwrap();
    assert!(a.is_live());
    assert_eq!(rt.live_queues(), 2);
}

// ---------------------------------------------------------------------------
// No accelerator
// ---------------------------------------------------------------------------

#[test]
fn test_empty_platform_list() {
    let rt = MockRuntime::new();
    let (result, sink) = build_recorded(&rt);
    let err = result.unwrap_err();

    assert!(err.is_no_accelerator());
    assert_eq!(err.status_code(), None);
    assert_eq!(rt.contexts_created(), 0);
    assert_eq!(rt.live_handles(), 0);
    assert_eq!(rt.calls(RuntimeCall::DeviceIds), 0);
    assert!(sink.lines().is_empty());
}

#[test]
fn test_no_available_device() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::unavailable("Busy 0"),
        MockDevice::unavailable("Busy 1"),
    ]);
    let err = AcceleratorContext::init(&rt, None).unwrap_err();
    assert!(matches!(err, AccelError::NoAcceleratorAvailable(_)));
    assert_eq!(rt.contexts_created(), 0);
}

#[test]
fn test_platform_without_devices() {
    let rt = MockRuntime::new().with_platform(Vec::<MockDevice>::new());
    let err = AcceleratorContext::init(&rt, None).unwrap_err();
    assert!(err.is_no_accelerator());
}

#[test]
fn test_platform_index_out_of_range() {
    let rt = MockRuntime::demo();
    let err = ContextBuilder::new(&rt).platform_index(3).build().unwrap_err();
    assert!(err.is_no_accelerator());
}

#[test]
fn test_device_index_out_of_range() {
    let rt = MockRuntime::demo();
    let err = AcceleratorContext::init(&rt, Some(5)).unwrap_err();
    assert!(err.is_no_accelerator());
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_device_index_must_be_available() {
    let rt = MockRuntime::new().with_platform([
        MockDevice::available("GPU 0"),
        MockDevice::unavailable("GPU 1"),
    ]);
    let err = AcceleratorContext::init(&rt, Some(1)).unwrap_err();
    assert!(err.is_no_accelerator());
}

// ---------------------------------------------------------------------------
// Rollback on failure
// ---------------------------------------------------------------------------

#[test]
fn test_failure_at_each_step_rolls_back() {
    let steps = [
        (RuntimeCall::PlatformIds, 0, ffi::CL_OUT_OF_HOST_MEMORY, "Determining available platforms"),
        (RuntimeCall::DeviceIds, 0, ffi::CL_INVALID_PLATFORM, "Determining devices on platform"),
        (RuntimeCall::DeviceAvailable, 0, ffi::CL_INVALID_DEVICE, "Querying device availability"),
        (RuntimeCall::DeviceName, 0, ffi::CL_OUT_OF_RESOURCES, "Querying device name"),
        (RuntimeCall::CreateContext, 0, ffi::CL_OUT_OF_HOST_MEMORY, "Creating context"),
        (RuntimeCall::CreateQueue, 0, ffi::CL_INVALID_QUEUE_PROPERTIES, "Creating kernel queue"),
        (RuntimeCall::CreateQueue, 1, ffi::CL_OUT_OF_RESOURCES, "Creating IO queue"),
        (RuntimeCall::CreateBuffer, 0, ffi::CL_MEM_OBJECT_ALLOCATION_FAILURE, "Allocating device vector"),
        (RuntimeCall::WriteBuffer, 0, ffi::CL_OUT_OF_RESOURCES, "Writing device vector"),
    ];

    for (call, skip, code, label) in steps {
        let rt = MockRuntime::demo().fail_nth(call, skip, code);
        let (result, sink) = build_recorded(&rt);
        let err = result.unwrap_err();

        assert_eq!(err.status_code(), Some(code), "{call:?}");
        assert_eq!(rt.live_handles(), 0, "{call:?} leaked a handle");

        let lines = sink.lines();
        assert_eq!(lines.len(), 1, "{call:?}: {lines:?}");
        assert!(lines[0].contains(label), "{call:?}: {}", lines[0]);
        assert!(lines[0].contains(&code.to_string()));
    }
}

#[test]
fn test_io_queue_failure_releases_kernel_queue() {
    let rt = MockRuntime::demo().fail_nth(RuntimeCall::CreateQueue, 1, ffi::CL_OUT_OF_RESOURCES);
    let err = AcceleratorContext::init(&rt, None).unwrap_err();
    assert_eq!(err.status_code(), Some(ffi::CL_OUT_OF_RESOURCES));
    assert_eq!(rt.calls(RuntimeCall::ReleaseQueue), 1);
    assert_eq!(rt.live_queues(), 0);
}

#[test]
fn test_self_test_failure_tears_down() {
    let rt = MockRuntime::demo().fail(RuntimeCall::WriteBuffer, ffi::CL_INVALID_COMMAND_QUEUE);
    let err = AcceleratorContext::init(&rt, None).unwrap_err();

    assert_eq!(err.status_code(), Some(ffi::CL_INVALID_COMMAND_QUEUE));
    // Both queues and the self-test buffer are gone.
    assert_eq!(rt.calls(RuntimeCall::ReleaseQueue), 2);
    assert_eq!(rt.calls(RuntimeCall::ReleaseBuffer), 1);
    assert_eq!(rt.live_handles(), 0);
}

#[test]
fn test_no_retry_after_failure() {
    let rt = MockRuntime::demo().fail(RuntimeCall::CreateContext, ffi::CL_DEVICE_NOT_AVAILABLE);
    let err = AcceleratorContext::init(&rt, None).unwrap_err();
    assert_eq!(err.status_code(), Some(ffi::CL_DEVICE_NOT_AVAILABLE));
    // The second device is not tried.
    assert_eq!(rt.calls(RuntimeCall::CreateContext), 1);
}

#[test]
fn test_retry_is_a_caller_decision() {
    let rt = MockRuntime::demo().fail(RuntimeCall::CreateContext, ffi::CL_DEVICE_NOT_AVAILABLE);
    assert!(AcceleratorContext::init(&rt, Some(0)).is_err());
    let ctx = AcceleratorContext::init(&rt, Some(1)).unwrap();
    assert_eq!(ctx.device(), rt.device_id(0, 1));
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[test]
fn test_destroy_twice_is_a_no_op() {
    let rt = MockRuntime::demo();
    let sink = Arc::new(RecordingSink::default());
    let mut ctx = ContextBuilder::new(&rt)
        .diagnostics(sink.clone())
        .build()
        .unwrap();

    ctx.destroy().unwrap();
    ctx.destroy().unwrap();
    drop(ctx);

    assert_eq!(rt.calls(RuntimeCall::ReleaseQueue), 2);
    assert_eq!(rt.live_handles(), 0);
    assert!(sink.lines().is_empty());
}

#[test]
fn test_destroy_keeps_identity() {
    let rt = MockRuntime::demo();
    let mut ctx = AcceleratorContext::init(&rt, None).unwrap();
    ctx.destroy().unwrap();

    assert!(!ctx.is_live());
    assert!(ctx.kernel_queue().is_none());
    assert!(ctx.io_queue().is_none());
    // The context handle and device are not released here.
    assert!(ctx.handle().is_some());
    assert_eq!(ctx.device(), rt.device_id(0, 0));
}

#[test]
fn test_every_failing_release_is_reported() {
    let rt = MockRuntime::demo()
        .fail(RuntimeCall::ReleaseQueue, ffi::CL_INVALID_COMMAND_QUEUE)
        .fail_nth(RuntimeCall::ReleaseQueue, 0, ffi::CL_OUT_OF_RESOURCES);
    let sink = Arc::new(RecordingSink::default());
    let mut ctx = ContextBuilder::new(&rt)
        .diagnostics(sink.clone())
        .build()
        .unwrap();

    let err = ctx.destroy().unwrap_err();
    // First failure wins.
    assert_eq!(err.status_code(), Some(ffi::CL_INVALID_COMMAND_QUEUE));

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Releasing kernel queue"));
    assert!(lines[1].contains("Releasing IO queue"));
    assert!(lines[1].contains("CL_OUT_OF_RESOURCES"));
}
