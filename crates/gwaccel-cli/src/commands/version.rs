//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - OpenCL accelerator context management",
        style("gwaccel").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  gwaccel      Context lifecycle, device selection and device vectors");
    println!("  gwaccel-cli  Command-line interface");
    println!();
    println!("Default OpenCL libraries:");
    for name in gwaccel::loader::DEFAULT_LIBRARY_NAMES {
        println!("  {}", style(name).dim());
    }
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
