// SPDX-License-Identifier: Apache-2.0
//! Platform and device discovery, and the device selection policy.
//!
//! Devices are scanned in enumeration order. Unavailable devices are logged
//! and skipped; the first available device the [`DeviceSelector`] accepts is
//! chosen and the scan stops there.

use crate::error::{AccelError, Result};
use crate::runtime::{ComputeRuntime, DeviceClass, DeviceId, PlatformId};
use crate::status::ErrorGuard;

// ---------------------------------------------------------------------------
// Selection policy
// ---------------------------------------------------------------------------

/// An available device offered to a [`DeviceSelector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// Position in the platform's device enumeration.
    pub index: usize,
    pub id: DeviceId,
    pub name: String,
}

/// Decides which available device a context is built on.
pub trait DeviceSelector {
    fn accepts(&self, candidate: &DeviceCandidate) -> bool;
}

impl<F> DeviceSelector for F
where
    F: Fn(&DeviceCandidate) -> bool,
{
    fn accepts(&self, candidate: &DeviceCandidate) -> bool {
        self(candidate)
    }
}

/// Take the first available device.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl DeviceSelector for FirstAvailable {
    fn accepts(&self, _candidate: &DeviceCandidate) -> bool {
        true
    }
}

/// Take the device at a given enumeration index, provided it is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByIndex(pub usize);

impl DeviceSelector for ByIndex {
    fn accepts(&self, candidate: &DeviceCandidate) -> bool {
        candidate.index == self.0
    }
}

/// Take the first available device whose name contains the given text,
/// ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByName(pub String);

impl DeviceSelector for ByName {
    fn accepts(&self, candidate: &DeviceCandidate) -> bool {
        candidate
            .name
            .to_lowercase()
            .contains(&self.0.to_lowercase())
    }
}

/// Accept only candidates every inner selector accepts.
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn DeviceSelector + Send + Sync>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: impl DeviceSelector + Send + Sync + 'static) -> Self {
        self.0.push(Box::new(selector));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DeviceSelector for AllOf {
    fn accepts(&self, candidate: &DeviceCandidate) -> bool {
        self.0.iter().all(|s| s.accepts(candidate))
    }
}

impl std::fmt::Debug for AllOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllOf")
            .field("selectors", &self.0.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Survey report
// ---------------------------------------------------------------------------

/// One device as seen by [`DeviceEnumerator::survey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub index: usize,
    pub id: DeviceId,
    /// `None` when the name query failed.
    pub name: Option<String>,
    /// `None` when the availability query failed.
    pub available: Option<bool>,
}

/// One platform and its devices as seen by [`DeviceEnumerator::survey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformReport {
    pub index: usize,
    pub id: PlatformId,
    pub devices: Vec<DeviceReport>,
    /// Status code if device enumeration itself failed.
    pub error: Option<i32>,
}

// ---------------------------------------------------------------------------
// Enumerator
// ---------------------------------------------------------------------------

/// Lists platforms and devices through an [`ErrorGuard`].
#[derive(Clone, Copy)]
pub struct DeviceEnumerator<'a> {
    runtime: &'a dyn ComputeRuntime,
    guard: &'a ErrorGuard,
}

impl<'a> DeviceEnumerator<'a> {
    pub fn new(runtime: &'a dyn ComputeRuntime, guard: &'a ErrorGuard) -> Self {
        Self { runtime, guard }
    }

    /// All platforms. May be empty.
    pub fn list_platforms(&self) -> Result<Vec<PlatformId>> {
        self.guard
            .guard(self.runtime.platform_ids(), "Determining available platforms")
    }

    /// Devices of `class` under `platform`. May be empty.
    pub fn list_devices(&self, platform: PlatformId, class: DeviceClass) -> Result<Vec<DeviceId>> {
        self.guard.guard(
            self.runtime.device_ids(platform, class),
            "Determining devices on platform",
        )
    }

    pub fn probe_availability(&self, device: DeviceId) -> Result<bool> {
        self.guard.guard(
            self.runtime.device_available(device),
            "Querying device availability",
        )
    }

    pub fn probe_name(&self, device: DeviceId) -> Result<String> {
        self.guard
            .guard(self.runtime.device_name(device), "Querying device name")
    }

    /// Pick a platform by enumeration index (0 for "first platform").
    pub fn select_platform(&self, index: usize) -> Result<PlatformId> {
        let platforms = self.list_platforms()?;
        if platforms.is_empty() {
            return Err(AccelError::NoAcceleratorAvailable(
                "no compute platforms found".into(),
            ));
        }
        let count = platforms.len();
        let platform = platforms.into_iter().nth(index).ok_or_else(|| {
            AccelError::NoAcceleratorAvailable(format!(
                "platform index {index} out of range ({count} platform(s) found)"
            ))
        })?;
        tracing::info!("selected platform #{index} of {count}");
        Ok(platform)
    }

    /// Scan the devices of `class` under `platform` and return the first
    /// available one that `selector` accepts.
    pub fn select_device(
        &self,
        platform: PlatformId,
        class: DeviceClass,
        selector: &dyn DeviceSelector,
    ) -> Result<DeviceCandidate> {
        let devices = self.list_devices(platform, class)?;
        if devices.is_empty() {
            return Err(AccelError::NoAcceleratorAvailable(format!(
                "no {class} devices on the selected platform"
            )));
        }

        for (index, id) in devices.iter().copied().enumerate() {
            if !self.probe_availability(id)? {
                // Name is informational only; a failing query is tolerated here.
                match self.runtime.device_name(id) {
                    Ok(name) => tracing::warn!("device {name} not available for compute"),
                    Err(_) => tracing::warn!("device #{index} not available for compute"),
                }
                continue;
            }

            let name = self.probe_name(id)?;
            let candidate = DeviceCandidate { index, id, name };
            if selector.accepts(&candidate) {
                tracing::info!("selected device #{index} '{}'", candidate.name);
                return Ok(candidate);
            }
            tracing::debug!("device #{index} '{}' rejected by selector", candidate.name);
        }

        Err(AccelError::NoAcceleratorAvailable(format!(
            "none of {} {class} device(s) is available and selected",
            devices.len()
        )))
    }

    /// Describe every platform and device without aborting on failures.
    ///
    /// Individual query failures are still reported through the guard.
    pub fn survey(&self, class: DeviceClass) -> Result<Vec<PlatformReport>> {
        let platforms = self.list_platforms()?;
        let mut reports = Vec::with_capacity(platforms.len());

        for (index, id) in platforms.into_iter().enumerate() {
            let (devices, error) = match self.list_devices(id, class) {
                Ok(devices) => (devices, None),
                Err(e) => (Vec::new(), e.status_code()),
            };

            let devices = devices
                .into_iter()
                .enumerate()
                .map(|(index, id)| DeviceReport {
                    index,
                    id,
                    name: self.probe_name(id).ok(),
                    available: self.probe_availability(id).ok(),
                })
                .collect();

            reports.push(PlatformReport {
                index,
                id,
                devices,
                error,
            });
        }

        Ok(reports)
    }
}
