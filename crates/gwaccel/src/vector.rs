// SPDX-License-Identifier: Apache-2.0
//! Device-resident vectors scoped to an [`AcceleratorContext`].
//!
//! A [`DeviceVector`] borrows the context it was allocated under, so it cannot
//! outlive it and the context cannot be torn down while the vector exists.
//! Complex vectors are stored split: one region for the real parts and one for
//! the imaginary parts.
//!
//! Allocation does not clear memory. Use [`DeviceVector::fill_zero`] or
//! [`DeviceVector::upload`] to establish contents.

use std::fmt;
use std::mem;

use num_complex::Complex;

use crate::context::AcceleratorContext;
use crate::error::{AccelError, Result};
use crate::runtime::{ContextHandle, MemHandle, QueueHandle};

// ---------------------------------------------------------------------------
// Element kinds
// ---------------------------------------------------------------------------

/// Numeric type of a vector's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    RealSingle,
    RealDouble,
    ComplexSingle,
    ComplexDouble,
}

impl ElementKind {
    /// Size of one element in bytes (both parts, for complex kinds).
    pub fn element_size(self) -> usize {
        match self {
            ElementKind::RealSingle => 4,
            ElementKind::RealDouble | ElementKind::ComplexSingle => 8,
            ElementKind::ComplexDouble => 16,
        }
    }

    /// Size of one scalar component in bytes.
    pub fn component_size(self) -> usize {
        match self {
            ElementKind::RealSingle | ElementKind::ComplexSingle => 4,
            ElementKind::RealDouble | ElementKind::ComplexDouble => 8,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, ElementKind::ComplexSingle | ElementKind::ComplexDouble)
    }

    /// Bytes per device region for `length` elements.
    fn region_size(self, length: usize) -> Option<usize> {
        let per_element = if self.is_complex() {
            self.component_size()
        } else {
            self.element_size()
        };
        length.checked_mul(per_element)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementKind::RealSingle => "real-single",
            ElementKind::RealDouble => "real-double",
            ElementKind::ComplexSingle => "complex-single",
            ElementKind::ComplexDouble => "complex-double",
        })
    }
}

/// Descriptive metadata carried by every vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorMeta {
    pub kind: ElementKind,
    /// Number of elements.
    pub length: usize,
    /// Sample spacing in the vector's domain (seconds or hertz).
    pub delta_x: f64,
    pub element_size_bytes: usize,
}

// ---------------------------------------------------------------------------
// Host element types
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for num_complex::Complex<f32> {}
    impl Sealed for num_complex::Complex<f64> {}
}

/// A floating-point component type.
pub trait Scalar: Copy + Default + sealed::Sealed {
    const SIZE: usize;

    fn append_ne_bytes(self, out: &mut Vec<u8>);

    /// `bytes.len()` must equal `SIZE`.
    fn from_ne_slice(bytes: &[u8]) -> Self;
}

impl Scalar for f32 {
    const SIZE: usize = 4;

    fn append_ne_bytes(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        f32::from_ne_bytes(raw)
    }
}

impl Scalar for f64 {
    const SIZE: usize = 8;

    fn append_ne_bytes(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        f64::from_ne_bytes(raw)
    }
}

/// A host element type that can be moved to and from a [`DeviceVector`].
pub trait Element: Copy + sealed::Sealed {
    type Scalar: Scalar;
    const KIND: ElementKind;

    fn re(self) -> Self::Scalar;
    fn im(self) -> Self::Scalar;
    fn from_parts(re: Self::Scalar, im: Self::Scalar) -> Self;
}

impl Element for f32 {
    type Scalar = f32;
    const KIND: ElementKind = ElementKind::RealSingle;

    fn re(self) -> f32 {
        self
    }
    fn im(self) -> f32 {
        0.0
    }
    fn from_parts(re: f32, _im: f32) -> Self {
        re
    }
}

impl Element for f64 {
    type Scalar = f64;
    const KIND: ElementKind = ElementKind::RealDouble;

    fn re(self) -> f64 {
        self
    }
    fn im(self) -> f64 {
        0.0
    }
    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }
}

impl Element for Complex<f32> {
    type Scalar = f32;
    const KIND: ElementKind = ElementKind::ComplexSingle;

    fn re(self) -> f32 {
        self.re
    }
    fn im(self) -> f32 {
        self.im
    }
    fn from_parts(re: f32, im: f32) -> Self {
        Complex::new(re, im)
    }
}

impl Element for Complex<f64> {
    type Scalar = f64;
    const KIND: ElementKind = ElementKind::ComplexDouble;

    fn re(self) -> f64 {
        self.re
    }
    fn im(self) -> f64 {
        self.im
    }
    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re, im)
    }
}

// ---------------------------------------------------------------------------
// Device vector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// Zero-length, or already released.
    Empty,
    Single(MemHandle),
    Split { real: MemHandle, imag: MemHandle },
}

/// A numeric array resident in device memory.
pub struct DeviceVector<'ctx> {
    context: &'ctx AcceleratorContext<'ctx>,
    meta: VectorMeta,
    storage: Storage,
}

impl<'ctx> DeviceVector<'ctx> {
    /// Allocate device memory for `length` elements of `kind`.
    ///
    /// Zero-length vectors hold no device memory. If the second region of a
    /// complex vector cannot be allocated, the first is released before the
    /// error is returned.
    pub fn allocate(
        context: &'ctx AcceleratorContext<'ctx>,
        kind: ElementKind,
        length: usize,
        delta_x: f64,
    ) -> Result<Self> {
        let meta = VectorMeta {
            kind,
            length,
            delta_x,
            element_size_bytes: kind.element_size(),
        };
        if length == 0 {
            return Ok(Self {
                context,
                meta,
                storage: Storage::Empty,
            });
        }

        let size = kind.region_size(length).ok_or_else(|| {
            AccelError::InvalidState(format!("{length} {kind} elements overflow the address space"))
        })?;
        let handle = live_context(context)?;
        let runtime = context.runtime();
        let guard = context.guard();

        let first = guard.guard(
            runtime.create_buffer(handle, size),
            "Allocating device vector",
        )?;
        let storage = if kind.is_complex() {
            match guard.guard(
                runtime.create_buffer(handle, size),
                "Allocating imaginary part of device vector",
            ) {
                Ok(imag) => Storage::Split { real: first, imag },
                Err(e) => {
                    let _ = guard.guard(
                        runtime.release_buffer(first),
                        "Releasing real part after failed allocation",
                    );
                    return Err(e);
                }
            }
        } else {
            Storage::Single(first)
        };

        tracing::debug!("allocated {kind} device vector of {length} elements");
        Ok(Self {
            context,
            meta,
            storage,
        })
    }

    /// Allocate a vector whose kind matches the host element type `T`.
    pub fn allocate_for<T: Element>(
        context: &'ctx AcceleratorContext<'ctx>,
        length: usize,
        delta_x: f64,
    ) -> Result<Self> {
        Self::allocate(context, T::KIND, length, delta_x)
    }

    pub fn meta(&self) -> &VectorMeta {
        &self.meta
    }

    pub fn kind(&self) -> ElementKind {
        self.meta.kind
    }

    pub fn len(&self) -> usize {
        self.meta.length
    }

    pub fn is_empty(&self) -> bool {
        self.meta.length == 0
    }

    pub fn delta_x(&self) -> f64 {
        self.meta.delta_x
    }

    /// The single device region of a real vector.
    pub fn data(&self) -> Option<MemHandle> {
        match self.storage {
            Storage::Single(mem) => Some(mem),
            _ => None,
        }
    }

    /// The real and imaginary regions of a complex vector.
    pub fn split_data(&self) -> Option<(MemHandle, MemHandle)> {
        match self.storage {
            Storage::Split { real, imag } => Some((real, imag)),
            _ => None,
        }
    }

    /// Copy `host` to the device through the context's I/O queue. Blocks
    /// until the transfer has completed.
    pub fn upload<T: Element>(&mut self, host: &[T]) -> Result<()> {
        self.check_host::<T>(host.len())?;
        match self.storage {
            Storage::Empty => Ok(()),
            Storage::Single(mem) => {
                let mut bytes = Vec::with_capacity(host.len() * T::Scalar::SIZE);
                for v in host {
                    v.re().append_ne_bytes(&mut bytes);
                }
                self.write(mem, &bytes, "Writing device vector")
            }
            Storage::Split { real, imag } => {
                let mut re = Vec::with_capacity(host.len() * T::Scalar::SIZE);
                let mut im = Vec::with_capacity(host.len() * T::Scalar::SIZE);
                for v in host {
                    v.re().append_ne_bytes(&mut re);
                    v.im().append_ne_bytes(&mut im);
                }
                self.write(real, &re, "Writing real part of device vector")?;
                self.write(imag, &im, "Writing imaginary part of device vector")
            }
        }
    }

    /// Copy the vector back to the host. Blocks until the transfer has
    /// completed.
    pub fn download<T: Element>(&self) -> Result<Vec<T>> {
        self.check_host::<T>(self.meta.length)?;
        let size = T::Scalar::SIZE;
        match self.storage {
            Storage::Empty => Ok(Vec::new()),
            Storage::Single(mem) => {
                let bytes = self.read(mem, "Reading device vector")?;
                Ok(bytes
                    .chunks_exact(size)
                    .map(|c| T::from_parts(T::Scalar::from_ne_slice(c), T::Scalar::default()))
                    .collect())
            }
            Storage::Split { real, imag } => {
                let re = self.read(real, "Reading real part of device vector")?;
                let im = self.read(imag, "Reading imaginary part of device vector")?;
                Ok(re
                    .chunks_exact(size)
                    .zip(im.chunks_exact(size))
                    .map(|(r, i)| {
                        T::from_parts(T::Scalar::from_ne_slice(r), T::Scalar::from_ne_slice(i))
                    })
                    .collect())
            }
        }
    }

    /// Clear every element to zero with an explicit transfer.
    pub fn fill_zero(&mut self) -> Result<()> {
        let Some(size) = self.meta.kind.region_size(self.meta.length) else {
            return Ok(());
        };
        match self.storage {
            Storage::Empty => Ok(()),
            Storage::Single(mem) => self.write(mem, &vec![0u8; size], "Clearing device vector"),
            Storage::Split { real, imag } => {
                let zeros = vec![0u8; size];
                self.write(real, &zeros, "Clearing real part of device vector")?;
                self.write(imag, &zeros, "Clearing imaginary part of device vector")
            }
        }
    }

    /// Free the device memory. Consumes the vector, so it cannot be released
    /// twice. Both regions of a complex vector are attempted even if the
    /// first release fails; the first failure is returned.
    pub fn release(mut self) -> Result<()> {
        let storage = mem::replace(&mut self.storage, Storage::Empty);
        self.release_storage(storage)
    }

    fn release_storage(&self, storage: Storage) -> Result<()> {
        let runtime = self.context.runtime();
        let guard = self.context.guard();
        match storage {
            Storage::Empty => Ok(()),
            Storage::Single(mem) => {
                guard.guard(runtime.release_buffer(mem), "Releasing device vector")
            }
            Storage::Split { real, imag } => {
                let re = guard.guard(
                    runtime.release_buffer(real),
                    "Releasing real part of device vector",
                );
                let im = guard.guard(
                    runtime.release_buffer(imag),
                    "Releasing imaginary part of device vector",
                );
                re.and(im)
            }
        }
    }

    fn check_host<T: Element>(&self, host_len: usize) -> Result<()> {
        if T::KIND != self.meta.kind {
            return Err(AccelError::KindMismatch {
                expected: self.meta.kind,
                actual: T::KIND,
            });
        }
        if host_len != self.meta.length {
            return Err(AccelError::LengthMismatch {
                expected: self.meta.length,
                actual: host_len,
            });
        }
        Ok(())
    }

    fn io_queue(&self) -> Result<QueueHandle> {
        self.context
            .io_queue()
            .ok_or_else(|| AccelError::InvalidState("context has no I/O queue".into()))
    }

    fn write(&self, mem: MemHandle, bytes: &[u8], label: &str) -> Result<()> {
        let queue = self.io_queue()?;
        self.context
            .guard()
            .guard(self.context.runtime().write_buffer(queue, mem, 0, bytes), label)
    }

    fn read(&self, mem: MemHandle, label: &str) -> Result<Vec<u8>> {
        let queue = self.io_queue()?;
        let size = self.meta.kind.region_size(self.meta.length).unwrap_or(0);
        let mut bytes = vec![0u8; size];
        self.context
            .guard()
            .guard(self.context.runtime().read_buffer(queue, mem, 0, &mut bytes), label)?;
        Ok(bytes)
    }
}

impl Drop for DeviceVector<'_> {
    fn drop(&mut self) {
        let storage = mem::replace(&mut self.storage, Storage::Empty);
        if storage != Storage::Empty {
            // Failures are already reported by the guard.
            let _ = self.release_storage(storage);
        }
    }
}

impl fmt::Debug for DeviceVector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceVector")
            .field("meta", &self.meta)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

fn live_context(context: &AcceleratorContext<'_>) -> Result<ContextHandle> {
    context
        .handle()
        .ok_or_else(|| AccelError::InvalidState("context has no execution context handle".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementKind::RealSingle.element_size(), 4);
        assert_eq!(ElementKind::RealDouble.element_size(), 8);
        assert_eq!(ElementKind::ComplexSingle.element_size(), 8);
        assert_eq!(ElementKind::ComplexDouble.element_size(), 16);
        assert_eq!(ElementKind::ComplexSingle.component_size(), 4);
        assert_eq!(ElementKind::ComplexDouble.component_size(), 8);
    }

    #[test]
    fn test_region_size() {
        assert_eq!(ElementKind::RealSingle.region_size(1024), Some(4096));
        // Split storage: each region holds one component per element.
        assert_eq!(ElementKind::ComplexDouble.region_size(10), Some(80));
        assert_eq!(ElementKind::RealDouble.region_size(usize::MAX), None);
    }

    #[test]
    fn test_element_kinds_of_host_types() {
        assert_eq!(<f32 as Element>::KIND, ElementKind::RealSingle);
        assert_eq!(<f64 as Element>::KIND, ElementKind::RealDouble);
        assert_eq!(<Complex<f32> as Element>::KIND, ElementKind::ComplexSingle);
        assert_eq!(<Complex<f64> as Element>::KIND, ElementKind::ComplexDouble);
    }

    #[test]
    fn test_display() {
        assert_eq!(ElementKind::ComplexSingle.to_string(), "complex-single");
    }
}
