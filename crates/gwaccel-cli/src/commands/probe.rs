//! Probe command implementation.

use anyhow::Result;
use console::style;

use gwaccel::{AccelConfig, ComputeRuntime, ContextBuilder};

use super::common::{RuntimeOptions, parse_class};

/// Execute the probe command.
pub fn execute(
    options: &RuntimeOptions,
    device: Option<usize>,
    name: Option<String>,
    platform: Option<usize>,
    class: Option<&str>,
) -> Result<()> {
    let mut config = options.load_config()?;
    apply_overrides(&mut config, device, name, platform, class)?;
    config.validate()?;

    let runtime = options.open_runtime(&config)?;
    run_probe(runtime.as_ref(), &config)
}

/// Command-line values take precedence over file and environment.
fn apply_overrides(
    config: &mut AccelConfig,
    device: Option<usize>,
    name: Option<String>,
    platform: Option<usize>,
    class: Option<&str>,
) -> Result<()> {
    if let Some(index) = device {
        config.device_index = Some(index);
    }
    if name.is_some() {
        config.device_name = name;
    }
    if let Some(index) = platform {
        config.platform_index = index;
    }
    if let Some(class) = class {
        config.device_class = parse_class(class)?;
    }
    Ok(())
}

fn run_probe(runtime: &dyn ComputeRuntime, config: &AccelConfig) -> Result<()> {
    println!(
        "{} Probing platform #{} for a {} device...",
        style("gwaccel").cyan().bold(),
        config.platform_index,
        config.device_class
    );

    let mut ctx = match ContextBuilder::from_config(runtime, config).build() {
        Ok(ctx) => ctx,
        Err(e) if e.is_no_accelerator() => {
            println!("  {} {}", style("○").yellow(), e);
            anyhow::bail!("no usable accelerator; the host path must be used");
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "  {} {}",
        style("●").green(),
        style(ctx.device_name().unwrap_or("<unnamed>")).bold()
    );
    println!(
        "    Self-test: {} elements transferred",
        config.self_test_len
    );
    println!("    Queues:    kernel + io");

    ctx.destroy()?;
    println!("    Teardown:  {}", style("ok").green());
    Ok(())
}
