//! Devices command implementation.

use anyhow::Result;
use console::style;

use gwaccel::{DeviceEnumerator, ErrorGuard, PlatformReport, status_name};

use super::common::{RuntimeOptions, parse_class};

/// Execute the devices command.
pub fn execute(options: &RuntimeOptions, class: Option<&str>) -> Result<()> {
    let config = options.load_config()?;
    let class = match class {
        Some(name) => parse_class(name)?,
        None => config.device_class,
    };
    let runtime = options.open_runtime(&config)?;
    let guard = ErrorGuard::default();

    let reports = DeviceEnumerator::new(runtime.as_ref(), &guard).survey(class)?;

    println!(
        "{} {} device(s):\n",
        style("gwaccel").cyan().bold(),
        style(class).bold()
    );
    if reports.is_empty() {
        println!("  {} no OpenCL platforms found", style("○").red());
        return Ok(());
    }
    for report in &reports {
        print_platform(report);
    }

    Ok(())
}

fn print_platform(report: &PlatformReport) {
    println!("  Platform #{}", report.index);
    if let Some(code) = report.error {
        println!(
            "    {} device query failed ({code}, {})",
            style("○").red(),
            status_name(code)
        );
    } else if report.devices.is_empty() {
        println!("    {} no matching devices", style("○").dim());
    }

    for device in &report.devices {
        let marker = match device.available {
            Some(true) => style("●").green(),
            Some(false) => style("○").yellow(),
            None => style("?").red(),
        };
        let name = device.name.as_deref().unwrap_or("<unnamed>");
        let status = match device.available {
            Some(true) => "available",
            Some(false) => "busy or offline",
            None => "availability unknown",
        };
        println!(
            "    {marker} #{} {} {}",
            device.index,
            style(name).bold(),
            style(format!("({status})")).dim()
        );
    }
    println!();
}
