//! Monitoring data managers and the configuration switch between them.
//!
//! The gateway asks for a [`MonitoringDataManager`] at startup and hands the
//! resulting factories to its services. Whether counters end up in a
//! shared-memory file or nowhere is decided by [`MonitoringConfig::enabled`];
//! the rest of the gateway never knows.

use crate::config::MonitoringConfig;
use crate::counters::MonitoringEntityFactory;
use crate::error::{GwmonError, Result};
use crate::layout::MonitorLayout;
use crate::mmf::{MonitorFile, RegionWriter, write_metadata};
use crate::types::ServiceDescriptor;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Service name to the factory minting that service's counters.
pub type FactoryMap = HashMap<String, Arc<dyn MonitoringEntityFactory>>;

/// Produces the per-service monitoring entity factories.
pub trait MonitoringDataManager: Send + fmt::Debug {
    /// Set up monitoring and return the factory of every monitored service.
    ///
    /// Calling it again returns the factories from the first call.
    fn initialize(&mut self) -> Result<FactoryMap>;

    /// Factories created by [`initialize`](Self::initialize); empty before it.
    fn monitoring_entity_factories(&self) -> &FactoryMap;

    /// Factory for the gateway's own counters, if this manager has one.
    fn gateway_factory(&self) -> Option<Arc<dyn MonitoringEntityFactory>> {
        None
    }
}

/// State once the monitor file is fully published.
#[derive(Debug)]
struct Published {
    file: MonitorFile,
    gateway: Arc<dyn MonitoringEntityFactory>,
}

/// Manager backed by a memory-mapped monitor file.
#[derive(Debug)]
pub struct MmfMonitoringDataManager {
    config: MonitoringConfig,
    services: Vec<ServiceDescriptor>,
    layout: MonitorLayout,
    published: Option<Published>,
    factories: FactoryMap,
}

impl MmfMonitoringDataManager {
    /// Plan the monitor file for `services`.
    ///
    /// Layout and name problems are reported here, before any file exists.
    pub fn new<S: AsRef<str>>(config: MonitoringConfig, services: &[S]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(services.len());
        for (index, service) in services.iter().enumerate() {
            let name = service.as_ref();
            if !seen.insert(name) {
                return Err(GwmonError::DuplicateService {
                    name: name.to_string(),
                });
            }
            descriptors.push(ServiceDescriptor::new(name, index));
        }

        let layout = MonitorLayout::plan_with(descriptors.len(), config.buffer_sizes)?;

        Ok(Self {
            config,
            services: descriptors,
            layout,
            published: None,
            factories: FactoryMap::new(),
        })
    }

    /// The planned layout.
    pub fn layout(&self) -> &MonitorLayout {
        &self.layout
    }

    /// Monitored services, in file order.
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// The monitor file, once initialized.
    pub fn file(&self) -> Option<&MonitorFile> {
        self.published.as_ref().map(|p| &p.file)
    }

    /// Whether [`initialize`](MonitoringDataManager::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.published.is_some()
    }
}

impl MonitoringDataManager for MmfMonitoringDataManager {
    fn initialize(&mut self) -> Result<FactoryMap> {
        if self.published.is_some() {
            return Ok(self.factories.clone());
        }

        let directory = self.config.monitor_directory();
        let gateway_id = self.config.gateway_id.as_str();
        let file = MonitorFile::create(&directory, gateway_id, self.layout.total_length())?;
        let names: Vec<&str> = self.services.iter().map(ServiceDescriptor::name).collect();
        let skeleton = write_metadata(&file, &self.layout, gateway_id, &names)?;

        let gateway: Arc<dyn MonitoringEntityFactory> =
            Arc::new(RegionWriter::gateway(&skeleton).write_counters_factory(gateway_id)?);

        let mut factories = FactoryMap::with_capacity(self.services.len());
        for service in &self.services {
            let factory = RegionWriter::service(&skeleton, service.index()).write_counters_factory(service.name())?;
            factories.insert(service.name().to_string(), Arc::new(factory) as Arc<dyn MonitoringEntityFactory>);
        }
        file.flush()?;

        tracing::info!(
            path = %file.path().display(),
            gateway_id = %gateway_id,
            services = self.services.len(),
            bytes = self.layout.total_length(),
            "Initialized monitoring"
        );

        self.published = Some(Published { file, gateway });
        self.factories = factories;
        Ok(self.factories.clone())
    }

    fn monitoring_entity_factories(&self) -> &FactoryMap {
        &self.factories
    }

    fn gateway_factory(&self) -> Option<Arc<dyn MonitoringEntityFactory>> {
        self.published.as_ref().map(|p| Arc::clone(&p.gateway))
    }
}

/// Manager used when monitoring is disabled or unavailable.
///
/// Creates nothing and returns an empty factory map.
#[derive(Debug, Default)]
pub struct NoopMonitoringDataManager {
    factories: FactoryMap,
}

impl NoopMonitoringDataManager {
    /// Create the no-op manager.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonitoringDataManager for NoopMonitoringDataManager {
    fn initialize(&mut self) -> Result<FactoryMap> {
        Ok(FactoryMap::new())
    }

    fn monitoring_entity_factories(&self) -> &FactoryMap {
        &self.factories
    }
}

/// Pick and initialize the manager for `config`.
///
/// A disabled configuration yields the no-op manager. When the
/// shared-memory manager cannot be planned or initialized the failure is
/// logged and the no-op manager is returned instead; monitoring problems
/// never stop the gateway.
pub fn init_monitoring<S: AsRef<str>>(
    config: &MonitoringConfig,
    services: &[S],
) -> Box<dyn MonitoringDataManager> {
    if !config.enabled {
        tracing::debug!("Monitoring disabled, using no-op manager");
        return Box::new(NoopMonitoringDataManager::new());
    }

    let initialized = MmfMonitoringDataManager::new(config.clone(), services).and_then(|mut manager| {
        manager.initialize()?;
        Ok(manager)
    });

    match initialized {
        Ok(manager) => Box::new(manager),
        Err(e) => {
            tracing::warn!(
                code = e.code(),
                error = %e,
                gateway_id = %config.gateway_id,
                "Monitoring unavailable, falling back to no-op manager"
            );
            Box::new(NoopMonitoringDataManager::new())
        }
    }
}

/// Service name to factory map for `config`; empty when monitoring is off.
pub fn make_monitoring_entity_factories<S: AsRef<str>>(
    config: &MonitoringConfig,
    services: &[S],
) -> FactoryMap {
    init_monitoring(config, services)
        .monitoring_entity_factories()
        .clone()
}
