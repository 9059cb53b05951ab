//! Publish command - run a demo writer that keeps a monitor file live.

use anyhow::{Context, Result};
use gwmon_core::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

/// Options for the publish command.
#[derive(Debug)]
pub struct PublishOptions {
    /// Gateway identifier, also the file name.
    pub gateway_id: String,
    /// Monitored service names.
    pub services: Vec<String>,
    /// Directory override.
    pub directory: Option<PathBuf>,
    /// Tick interval.
    pub interval: Duration,
    /// Counters per owner; `None` uses the default buffer sizes.
    pub capacity: Option<u32>,
}

impl PublishOptions {
    fn config(&self) -> MonitoringConfig {
        let mut config = MonitoringConfig::from_env()
            .with_enabled(true)
            .with_gateway_id(self.gateway_id.clone());
        if let Some(dir) = &self.directory {
            config = config.with_directory(dir.clone());
        }
        if let Some(capacity) = self.capacity {
            config = config.with_buffer_sizes(BufferSizes::for_counters(capacity));
        }
        config
    }
}

/// A `ticks` counter for every owner in the file.
struct Tickers {
    counters: Vec<Counter>,
}

impl Tickers {
    fn mint(manager: &MmfMonitoringDataManager) -> Result<Self> {
        let mut counters = Vec::with_capacity(manager.services().len() + 1);
        if let Some(gateway) = manager.gateway_factory() {
            counters.push(gateway.create_counter("ticks")?);
        }
        let factories = manager.monitoring_entity_factories();
        for service in manager.services() {
            let factory = factories
                .get(service.name())
                .with_context(|| format!("No factory for service {}", service.name()))?;
            counters.push(factory.create_counter("ticks")?);
        }
        Ok(Self { counters })
    }

    fn tick(&self) {
        for counter in &self.counters {
            counter.increment();
        }
    }
}

/// Run the publish command until Ctrl-C.
pub async fn run(options: PublishOptions) -> Result<()> {
    let config = options.config();
    let mut manager = MmfMonitoringDataManager::new(config.clone(), &options.services)
        .context("Failed to plan monitor file")?;
    manager
        .initialize()
        .with_context(|| format!("Failed to create monitor file at {}", config.monitor_file_path().display()))?;

    let tickers = Tickers::mint(&manager)?;

    println!("Publishing monitor file");
    println!("=======================");
    println!("Path:      {}", config.monitor_file_path().display());
    println!("Gateway:   {}", config.gateway_id);
    println!("Services:  {}", options.services.join(", "));
    println!("Interval:  {:?}", options.interval);
    println!();
    println!("Press Ctrl-C to stop.");

    let mut interval = tokio::time::interval(options.interval);
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tickers.tick();
                ticks += 1;
                tracing::trace!(ticks, "Tick");
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    tracing::info!(ticks, "Stopped publishing");
    println!();
    println!("Stopped after {} ticks.", ticks);
    Ok(())
}
