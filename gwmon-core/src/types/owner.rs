//! Owners of counter regions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity a label/value region pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionOwner {
    /// The gateway process itself.
    Gateway,
    /// The monitored service at this index.
    Service(usize),
}

impl fmt::Display for RegionOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway => write!(f, "gateway"),
            Self::Service(index) => write!(f, "service_{}", index),
        }
    }
}

/// A monitored service and its position in the monitor file.
///
/// The index is the position in the order services were supplied at
/// construction. Reference quad addresses are derived from it, so it never
/// changes for the life of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    name: String,
    index: usize,
}

impl ServiceDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The region owner for this service.
    pub fn owner(&self) -> RegionOwner {
        RegionOwner::Service(self.index)
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}
