//! Version command - show version information.

use anyhow::Result;
use gwmon_core::layout::MONITOR_VERSION;

/// Version information.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run() -> Result<()> {
    println!("gwmon - Gateway shared-memory monitoring");
    println!();
    println!("Version:     {}", VERSION);
    println!("File format: {}", MONITOR_VERSION);
    println!(
        "Platform:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!("Directory:   {}", gwmon_core::resolve_directory().display());
    println!();
    println!("Components:");
    println!("  gwmon-core  Layout, monitor file writer, counters, reader");
    println!("  gwmon-cli   Command-line interface");

    Ok(())
}
