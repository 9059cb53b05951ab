//! Path command - print where a gateway's monitor file lives.

use anyhow::Result;
use gwmon_core::MonitoringConfig;

/// Run the path command.
pub fn run(gateway_id: Option<&str>) -> Result<()> {
    let mut config = MonitoringConfig::from_env();
    if let Some(id) = gateway_id {
        config = config.with_gateway_id(id);
    }
    println!("{}", config.monitor_file_path().display());
    Ok(())
}
