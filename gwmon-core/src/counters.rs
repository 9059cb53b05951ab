//! Counters minted inside an owner's regions.
//!
//! Each owner (the gateway or a service) gets one [`MmfCounterFactory`]
//! bound to its label/value region pair. Counter `k` of a factory uses:
//!
//! - an 8-byte value slot at `values.offset + k * 8`
//! - a 256-byte label record at `labels.offset + k * 256`: a length word
//!   followed by the UTF-8 label
//!
//! The label length word is stored last, with release ordering, so a reader
//! that sees a non-zero length sees the whole label. Slots are handed out
//! in order and never reused.

use crate::error::{GwmonError, Result};
use crate::layout::{LABEL_RECORD_LENGTH, MAX_LABEL_LENGTH, VALUE_SLOT_LENGTH};
use crate::mmf::{CounterRegion, ValueSlot};
use crate::types::RegionOwner;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;

/// Capability to mint named counters for one owner.
///
/// Gateway and service code depend on this trait only; whether the counters
/// live in a shared-memory file is a configuration decision.
pub trait MonitoringEntityFactory: Send + Sync + fmt::Debug {
    /// Allocate a new counter labelled `name`, starting at zero.
    fn create_counter(&self, name: &str) -> Result<Counter>;

    /// Number of counters this factory can hold in total.
    fn capacity(&self) -> usize;

    /// Number of counters created so far.
    fn counters_created(&self) -> usize;
}

/// A single named counter backed by a value slot in the monitor file.
///
/// Cheap to clone; clones update the same slot.
#[derive(Clone)]
pub struct Counter {
    name: String,
    slot: ValueSlot,
}

impl Counter {
    /// Label of the counter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.slot.atomic().load(Ordering::Acquire)
    }

    /// Overwrite the value.
    pub fn set(&self, value: u64) {
        self.slot.atomic().store(value, Ordering::Release);
    }

    /// Add one and return the new value.
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Subtract one (saturating at zero) and return the new value.
    pub fn decrement(&self) -> u64 {
        let previous = self
            .slot
            .atomic()
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: u64) -> u64 {
        self.slot
            .atomic()
            .fetch_add(delta, Ordering::AcqRel)
            .wrapping_add(delta)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.name)
            .field("offset", &self.slot.offset())
            .field("value", &self.get())
            .finish()
    }
}

/// Counter factory over a published label/value region pair.
pub struct MmfCounterFactory {
    owner_name: String,
    labels: CounterRegion,
    values: CounterRegion,
    capacity: usize,
    /// Next free slot; serializes allocation within this owner.
    next: Mutex<usize>,
}

impl MmfCounterFactory {
    /// Bind a factory to two regions of the same owner.
    pub fn new(owner_name: impl Into<String>, labels: CounterRegion, values: CounterRegion) -> Self {
        let owner_name = owner_name.into();
        let capacity = (values.len() / VALUE_SLOT_LENGTH).min(labels.len() / LABEL_RECORD_LENGTH);
        tracing::debug!(
            owner = %owner_name,
            capacity,
            labels = %labels.span(),
            values = %values.span(),
            "Created counter factory"
        );
        Self {
            owner_name,
            labels,
            values,
            capacity,
            next: Mutex::new(0),
        }
    }

    /// Name of the owner (gateway identifier or service name).
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Region owner.
    pub fn owner(&self) -> RegionOwner {
        self.values.owner()
    }

    /// The labels region.
    pub fn labels(&self) -> &CounterRegion {
        &self.labels
    }

    /// The values region.
    pub fn values(&self) -> &CounterRegion {
        &self.values
    }
}

impl fmt::Debug for MmfCounterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmfCounterFactory")
            .field("owner", &self.owner_name)
            .field("labels", &self.labels.span())
            .field("values", &self.values.span())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl MonitoringEntityFactory for MmfCounterFactory {
    fn create_counter(&self, name: &str) -> Result<Counter> {
        if name.is_empty() {
            return Err(GwmonError::InvalidLabel {
                label: name.to_string(),
                cause: "label is empty".to_string(),
            });
        }
        if name.len() > MAX_LABEL_LENGTH {
            return Err(GwmonError::InvalidLabel {
                label: name.to_string(),
                cause: format!("label is {} bytes, at most {} fit", name.len(), MAX_LABEL_LENGTH),
            });
        }

        let mut next = self.next.lock();
        let index = *next;
        if index >= self.capacity {
            return Err(GwmonError::CounterCapacity {
                owner: self.owner_name.clone(),
                capacity: self.capacity,
            });
        }

        let slot = self
            .values
            .file()
            .value_slot(self.values.offset() + index * VALUE_SLOT_LENGTH)?;
        slot.atomic().store(0, Ordering::Relaxed);

        let record = self.labels.offset() + index * LABEL_RECORD_LENGTH;
        self.labels
            .file()
            .put_bytes_prefixed(record, "counter label", name, MAX_LABEL_LENGTH)?;
        *next += 1;

        tracing::trace!(owner = %self.owner_name, counter = %name, index, "Created counter");

        Ok(Counter {
            name: name.to_string(),
            slot,
        })
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn counters_created(&self) -> usize {
        *self.next.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BufferSizes, MonitorLayout};
    use crate::mmf::{MonitorFile, RegionWriter, write_metadata};
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    fn gateway_factory(counters: u32) -> (TempDir, MonitorFile, MmfCounterFactory) {
        let dir = tempdir().unwrap();
        let layout = MonitorLayout::plan_with(0, BufferSizes::for_counters(counters)).unwrap();
        let file = MonitorFile::create(dir.path(), "gw", layout.total_length()).unwrap();
        let skeleton = write_metadata::<&str>(&file, &layout, "gw", &[]).unwrap();
        let factory = RegionWriter::gateway(&skeleton)
            .write_counters_factory("gw")
            .unwrap();
        (dir, file, factory)
    }

    #[test]
    fn counter_updates_land_in_value_slot() {
        let (_dir, file, factory) = gateway_factory(8);
        let sessions = factory.create_counter("sessions.current").unwrap();
        let bytes = factory.create_counter("bytes.read").unwrap();

        sessions.increment();
        sessions.increment();
        sessions.decrement();
        bytes.set(1500);
        bytes.add(500);

        assert_eq!(sessions.get(), 1);
        assert_eq!(bytes.get(), 2000);

        let values = factory.values().offset();
        assert_eq!(file.get_u32(values).unwrap(), 1);
        assert_eq!(file.get_u32(values + VALUE_SLOT_LENGTH).unwrap(), 2000);
    }

    #[test]
    fn labels_are_recorded_in_order() {
        let (_dir, file, factory) = gateway_factory(8);
        factory.create_counter("first").unwrap();
        factory.create_counter("second").unwrap();

        let labels = factory.labels().offset();
        assert_eq!(file.get_str(labels).unwrap(), "first");
        assert_eq!(file.get_str(labels + LABEL_RECORD_LENGTH).unwrap(), "second");
        assert_eq!(file.get_u32(labels + 2 * LABEL_RECORD_LENGTH).unwrap(), 0);
        assert_eq!(factory.counters_created(), 2);
    }

    #[test]
    fn capacity_is_enforced() {
        let (_dir, _file, factory) = gateway_factory(8);
        assert_eq!(factory.capacity(), 8);
        for i in 0..8 {
            factory.create_counter(&format!("c{}", i)).unwrap();
        }
        let err = factory.create_counter("one-too-many").unwrap_err();
        assert_eq!(err.code(), "E203");
    }

    #[test]
    fn invalid_labels_are_rejected() {
        let (_dir, _file, factory) = gateway_factory(8);
        assert_eq!(factory.create_counter("").unwrap_err().code(), "E202");
        let long = "l".repeat(MAX_LABEL_LENGTH + 1);
        assert_eq!(factory.create_counter(&long).unwrap_err().code(), "E202");
        assert_eq!(factory.counters_created(), 0);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let (_dir, _file, factory) = gateway_factory(8);
        let counter = factory.create_counter("gauge").unwrap();
        assert_eq!(counter.decrement(), 0);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (_dir, _file, factory) = gateway_factory(8);
        let counter = factory.create_counter("requests").unwrap();
        let factory = Arc::new(factory);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let counter = counter.clone();
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || {
                    factory.create_counter(&format!("worker.{}", t)).unwrap();
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 4000);
        assert_eq!(factory.counters_created(), 5);
    }
}
