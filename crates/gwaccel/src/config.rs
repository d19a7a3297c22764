// SPDX-License-Identifier: Apache-2.0
//! Accelerator configuration.
//!
//! Sources, highest precedence first:
//! 1. Environment variables (`GWACCEL_` prefix)
//! 2. Configuration file (YAML)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_SELF_TEST_LEN;
use crate::error::{AccelError, Result};
use crate::runtime::DeviceClass;

pub const ENV_LIBRARY: &str = "GWACCEL_OPENCL_LIBRARY";
pub const ENV_PLATFORM_INDEX: &str = "GWACCEL_PLATFORM_INDEX";
pub const ENV_DEVICE_INDEX: &str = "GWACCEL_DEVICE_INDEX";
pub const ENV_DEVICE_NAME: &str = "GWACCEL_DEVICE_NAME";
pub const ENV_DEVICE_CLASS: &str = "GWACCEL_DEVICE_CLASS";
pub const ENV_SELF_TEST_LEN: &str = "GWACCEL_SELF_TEST_LEN";

/// How to find and select an accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelConfig {
    /// OpenCL library to load. `None` searches the platform's default names.
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Platform enumeration index.
    #[serde(default)]
    pub platform_index: usize,

    /// Restrict selection to this device enumeration index.
    #[serde(default)]
    pub device_index: Option<usize>,

    /// Restrict selection to devices whose name contains this (case-insensitive).
    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(default)]
    pub device_class: DeviceClass,

    /// Elements moved by the construction self-test.
    #[serde(default = "default_self_test_len")]
    pub self_test_len: usize,
}

fn default_self_test_len() -> usize {
    DEFAULT_SELF_TEST_LEN
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            platform_index: 0,
            device_index: None,
            device_name: None,
            device_class: DeviceClass::default(),
            self_test_len: default_self_test_len(),
        }
    }
}

impl AccelConfig {
    /// Load and validate a YAML file. Environment overrides are not applied.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: AccelConfig = serde_yaml_ng::from_str(&contents)
            .map_err(|e| AccelError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().merge_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Optional file, then environment overrides, then validation.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.merge_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup`. Only keys that are present override.
    pub fn merge_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_LIBRARY) {
            self.library_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_PLATFORM_INDEX) {
            self.platform_index = parse_var(ENV_PLATFORM_INDEX, &v)?;
        }
        if let Some(v) = lookup(ENV_DEVICE_INDEX) {
            self.device_index = Some(parse_var(ENV_DEVICE_INDEX, &v)?);
        }
        if let Some(v) = lookup(ENV_DEVICE_NAME) {
            self.device_name = Some(v);
        }
        if let Some(v) = lookup(ENV_DEVICE_CLASS) {
            self.device_class = DeviceClass::from_name(&v).ok_or_else(|| {
                AccelError::Config(format!("{ENV_DEVICE_CLASS}: unknown device class '{v}'"))
            })?;
        }
        if let Some(v) = lookup(ENV_SELF_TEST_LEN) {
            self.self_test_len = parse_var(ENV_SELF_TEST_LEN, &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.self_test_len == 0 {
            return Err(AccelError::Config(
                "self_test_len must be greater than 0".to_string(),
            ));
        }
        if let Some(name) = &self.device_name {
            if name.trim().is_empty() {
                return Err(AccelError::Config(
                    "device_name must not be empty; omit the field to accept any device"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AccelError::Config(format!("{key}: cannot parse '{value}'")))
}
