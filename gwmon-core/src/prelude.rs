//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use gwmon_core::prelude::*;
//! ```

// Core types
pub use crate::types::{RegionKind, RegionOwner, RegionSpan, ServiceDescriptor};

// Error handling
pub use crate::error::{GwmonError, Result};

// Layout
pub use crate::layout::{BufferSizes, MonitorLayout};

// Monitor file
pub use crate::mmf::{CounterRegion, MonitorFile, RegionWriter, Skeleton, write_metadata};

// Counters
pub use crate::counters::{Counter, MmfCounterFactory, MonitoringEntityFactory};

// Managers
pub use crate::config::MonitoringConfig;
pub use crate::directory::resolve_directory;
pub use crate::manager::{
    FactoryMap, MmfMonitoringDataManager, MonitoringDataManager, NoopMonitoringDataManager,
    init_monitoring, make_monitoring_entity_factories,
};

// Reader
pub use crate::reader::{CounterSnapshot, MonitorReader, MonitorSnapshot, RegionRefs};
