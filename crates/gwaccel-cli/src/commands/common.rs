//! Shared helpers for CLI commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use gwaccel::{AccelConfig, ComputeRuntime, DeviceClass, MockRuntime, OpenClRuntime};

/// Global flags that decide which runtime a command talks to.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub library: Option<PathBuf>,
    pub mock: bool,
    pub config: Option<PathBuf>,
}

impl RuntimeOptions {
    /// Configuration from file and environment, with `--library` on top.
    pub fn load_config(&self) -> Result<AccelConfig> {
        let mut config = AccelConfig::load(self.config.as_deref())
            .context("failed to load accelerator configuration")?;
        if let Some(library) = &self.library {
            config.library_path = Some(library.clone());
        }
        Ok(config)
    }

    /// The runtime selected by `--mock` or the configured library.
    pub fn open_runtime(&self, config: &AccelConfig) -> Result<Box<dyn ComputeRuntime>> {
        if self.mock {
            tracing::info!("using in-memory mock runtime");
            return Ok(Box::new(MockRuntime::demo()));
        }

        let runtime = match &config.library_path {
            Some(path) => OpenClRuntime::load(path)?,
            None => OpenClRuntime::load_default()?,
        };
        tracing::debug!("runtime ready ({})", runtime.library_path());
        Ok(Box::new(runtime))
    }
}

/// Parse a `--class` argument.
pub fn parse_class(name: &str) -> Result<DeviceClass> {
    DeviceClass::from_name(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown device class: '{name}' (expected gpu, accelerator, cpu, default or all)"
        )
    })
}
