//! gwmon core library
//!
//! This crate publishes a gateway's counters through a memory-mapped
//! monitor file that out-of-process tools can read without locks.
//!
//! # Overview
//!
//! At startup the gateway plans the file for its monitored services, creates
//! it (replacing any stale file from a previous run), writes the metadata
//! skeleton and then publishes one label/value buffer pair for itself and for
//! each service. Each published pair comes with a counter factory.
//!
//! # Key Components
//!
//! - **Layout**: pure offset arithmetic, computed before the file exists
//! - **MMF**: the mapped file, metadata writer and region writers
//! - **Counters**: the factory boundary services mint counters through
//! - **Manager**: the switch between the shared-memory and no-op managers
//! - **Reader**: read-only decoding for monitoring tools
//!
//! # Example
//!
//! ```ignore
//! use gwmon_core::prelude::*;
//!
//! let config = MonitoringConfig::from_env().with_gateway_id("gw-1");
//! let factories = make_monitoring_entity_factories(&config, &["http", "ws"]);
//!
//! if let Some(http) = factories.get("http") {
//!     let sessions = http.create_counter("sessions.current")?;
//!     sessions.increment();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod counters;
pub mod directory;
pub mod error;
pub mod layout;
pub mod manager;
pub mod mmf;
pub mod prelude;
pub mod reader;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::MonitoringConfig;
pub use counters::{Counter, MmfCounterFactory, MonitoringEntityFactory};
pub use directory::resolve_directory;
pub use error::{GwmonError, Result};
pub use layout::{BufferSizes, MonitorLayout};
pub use manager::{
    FactoryMap, MmfMonitoringDataManager, MonitoringDataManager, NoopMonitoringDataManager,
    init_monitoring, make_monitoring_entity_factories,
};
pub use mmf::{MonitorFile, Skeleton, write_metadata};
pub use reader::MonitorReader;
pub use types::{RegionKind, RegionOwner, RegionSpan};
