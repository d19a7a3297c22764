// SPDX-License-Identifier: Apache-2.0
//! Device vector allocation, transfers and release against the in-memory runtime.

use std::sync::Arc;

use gwaccel::mock::{MockRuntime, RecordingSink, RuntimeCall};
use gwaccel::{AccelError, AcceleratorContext, ContextBuilder, DeviceVector, ElementKind, ffi};
use num_complex::Complex;

// The self-test allocates, writes and releases one buffer during construction.
const SELF_TEST_BUFFERS: usize = 1;

fn context(rt: &MockRuntime) -> AcceleratorContext<'_> {
    AcceleratorContext::init(rt, None).expect("context build failed")
}

// ---------------------------------------------------------------------------
// Allocation and release
// ---------------------------------------------------------------------------

#[test]
fn test_allocate_release_round_trip() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);

    let v = ctx
        .allocate_vector(ElementKind::RealSingle, 1024, 1.0)
        .unwrap();
    assert_eq!(rt.live_buffers(), 1);
    assert_eq!(v.len(), 1024);
    assert_eq!(v.meta().element_size_bytes, 4);
    assert_eq!(v.delta_x(), 1.0);
    let mem = v.data().expect("real vector has one region");
    assert_eq!(rt.buffer_contents(mem).map(|b| b.len()), Some(4096));

    v.release().unwrap();
    assert_eq!(rt.live_buffers(), 0);
}

#[test]
fn test_drop_releases_device_memory() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    {
        let _a = ctx.allocate_vector(ElementKind::RealDouble, 16, 0.5).unwrap();
        let _b = ctx.allocate_vector(ElementKind::ComplexSingle, 16, 0.5).unwrap();
        assert_eq!(rt.live_buffers(), 3);
    }
    assert_eq!(rt.live_buffers(), 0);
}

#[test]
fn test_complex_vector_is_split() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);

    let v = ctx
        .allocate_vector(ElementKind::ComplexDouble, 100, 0.25)
        .unwrap();
    assert!(v.data().is_none());
    let (re, im) = v.split_data().expect("complex vector has two regions");
    assert_ne!(re, im);
    assert_eq!(v.meta().element_size_bytes, 16);
    // Each region holds one component per element.
    assert_eq!(rt.buffer_contents(re).map(|b| b.len()), Some(800));
    assert_eq!(rt.buffer_contents(im).map(|b| b.len()), Some(800));

    v.release().unwrap();
    assert_eq!(
        rt.calls(RuntimeCall::ReleaseBuffer),
        SELF_TEST_BUFFERS + 2
    );
    assert_eq!(rt.live_buffers(), 0);
}

#[test]
fn test_split_allocation_rolls_back_first_region() {
    // Let the self-test and the real region through, fail the imaginary one.
    let rt = MockRuntime::demo().fail_nth(
        RuntimeCall::CreateBuffer,
        SELF_TEST_BUFFERS + 1,
        ffi::CL_MEM_OBJECT_ALLOCATION_FAILURE,
    );
    let sink = Arc::new(RecordingSink::default());
    let ctx = ContextBuilder::new(&rt)
        .diagnostics(sink.clone())
        .build()
        .unwrap();

    let err = ctx
        .allocate_vector(ElementKind::ComplexSingle, 64, 1.0)
        .unwrap_err();
    assert_eq!(err.status_code(), Some(ffi::CL_MEM_OBJECT_ALLOCATION_FAILURE));
    assert_eq!(rt.live_buffers(), 0);
    assert_eq!(rt.calls(RuntimeCall::ReleaseBuffer), SELF_TEST_BUFFERS + 1);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("imaginary part"));
}

#[test]
fn test_zero_length_holds_no_memory() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);

    let mut v = ctx.allocate_vector(ElementKind::ComplexSingle, 0, 1.0).unwrap();
    assert!(v.is_empty());
    assert!(v.data().is_none());
    assert!(v.split_data().is_none());
    assert_eq!(rt.calls(RuntimeCall::CreateBuffer), SELF_TEST_BUFFERS);

    v.upload::<Complex<f32>>(&[]).unwrap();
    assert!(v.download::<Complex<f32>>().unwrap().is_empty());
    v.fill_zero().unwrap();
    v.release().unwrap();
    assert_eq!(rt.calls(RuntimeCall::ReleaseBuffer), SELF_TEST_BUFFERS);
}

#[test]
fn test_allocate_for_host_type() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let v = DeviceVector::allocate_for::<Complex<f64>>(&ctx, 8, 1.0).unwrap();
    assert_eq!(v.kind(), ElementKind::ComplexDouble);
}

#[test]
fn test_allocation_after_destroy_still_works() {
    // Teardown releases queues only; the context handle stays valid for
    // allocation, but transfers need the I/O queue.
    let rt = MockRuntime::demo();
    let mut ctx = context(&rt);
    ctx.destroy().unwrap();

    let mut v = ctx.allocate_vector(ElementKind::RealSingle, 4, 1.0).unwrap();
    let err = v.upload(&[1.0f32; 4]).unwrap_err();
    assert!(matches!(err, AccelError::InvalidState(_)));
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[test]
fn test_upload_download_real() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let host: Vec<f64> = (0..32).map(|i| f64::from(i) * 0.5).collect();

    let mut v = ctx.allocate_vector(ElementKind::RealDouble, 32, 1.0).unwrap();
    v.upload(&host).unwrap();
    assert_eq!(v.download::<f64>().unwrap(), host);
}

#[test]
fn test_upload_download_complex() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let host: Vec<Complex<f32>> = (0..8)
        .map(|i| Complex::new(i as f32, -(i as f32) * 2.0))
        .collect();

    let mut v = ctx
        .allocate_vector(ElementKind::ComplexSingle, 8, 1.0 / 16.0)
        .unwrap();
    v.upload(&host).unwrap();
    assert_eq!(v.download::<Complex<f32>>().unwrap(), host);

    // Real parts and imaginary parts live in separate regions.
    let (re, im) = v.split_data().unwrap();
    let re_bytes = rt.buffer_contents(re).unwrap();
    let im_bytes = rt.buffer_contents(im).unwrap();
    assert_eq!(&re_bytes[4..8], &1.0f32.to_ne_bytes());
    assert_eq!(&im_bytes[4..8], &(-2.0f32).to_ne_bytes());
}

#[test]
fn test_transfers_use_io_queue() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let writes_before = rt.calls(RuntimeCall::WriteBuffer);

    let mut v = ctx.allocate_vector(ElementKind::ComplexDouble, 4, 1.0).unwrap();
    v.upload(&[Complex::new(1.0f64, 1.0); 4]).unwrap();
    assert_eq!(rt.calls(RuntimeCall::WriteBuffer) - writes_before, 2);
    v.download::<Complex<f64>>().unwrap();
    assert_eq!(rt.calls(RuntimeCall::ReadBuffer), 2);
}

#[test]
fn test_fill_zero_clears_allocation() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);

    let mut v = ctx.allocate_vector(ElementKind::RealSingle, 16, 1.0).unwrap();
    // Allocation alone does not clear memory.
    let mem = v.data().unwrap();
    assert!(rt.buffer_contents(mem).unwrap().iter().any(|&b| b != 0));

    v.fill_zero().unwrap();
    assert!(rt.buffer_contents(mem).unwrap().iter().all(|&b| b == 0));
    assert_eq!(v.download::<f32>().unwrap(), vec![0.0f32; 16]);
}

#[test]
fn test_kind_mismatch() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let mut v = ctx.allocate_vector(ElementKind::RealSingle, 4, 1.0).unwrap();

    let err = v.upload(&[1.0f64; 4]).unwrap_err();
    assert!(matches!(
        err,
        AccelError::KindMismatch {
            expected: ElementKind::RealSingle,
            actual: ElementKind::RealDouble,
        }
    ));
    assert!(v.download::<Complex<f32>>().is_err());
}

#[test]
fn test_length_mismatch() {
    let rt = MockRuntime::demo();
    let ctx = context(&rt);
    let mut v = ctx.allocate_vector(ElementKind::RealSingle, 4, 1.0).unwrap();
    let writes_before = rt.calls(RuntimeCall::WriteBuffer);

    let err = v.upload(&[1.0f32; 3]).unwrap_err();
    assert!(matches!(
        err,
        AccelError::LengthMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert_eq!(rt.calls(RuntimeCall::WriteBuffer), writes_before);
}

#[test]
fn test_transfer_failure_propagates_status() {
    // The self-test write succeeds, the next one fails.
    let rt = MockRuntime::demo().fail_nth(RuntimeCall::WriteBuffer, 1, ffi::CL_OUT_OF_RESOURCES);
    let ctx = context(&rt);
    let mut v = ctx.allocate_vector(ElementKind::RealSingle, 4, 1.0).unwrap();

    let err = v.upload(&[0.5f32; 4]).unwrap_err();
    assert_eq!(err.status_code(), Some(ffi::CL_OUT_OF_RESOURCES));
    // A failed transfer does not release the vector.
    assert_eq!(rt.live_buffers(), 1);
}

#[test]
fn test_release_attempts_both_regions() {
    let rt = MockRuntime::demo().fail_nth(
        RuntimeCall::ReleaseBuffer,
        SELF_TEST_BUFFERS,
        ffi::CL_INVALID_MEM_OBJECT,
    );
    let ctx = context(&rt);
    let v = ctx.allocate_vector(ElementKind::ComplexSingle, 4, 1.0).unwrap();

    let err = v.release().unwrap_err();
    assert_eq!(err.status_code(), Some(ffi::CL_INVALID_MEM_OBJECT));
    assert_eq!(rt.calls(RuntimeCall::ReleaseBuffer), SELF_TEST_BUFFERS + 2);
    // The injected failure left the real region behind; the imaginary one is gone.
    assert_eq!(rt.live_buffers(), 1);
}
