//! Integration tests for the monitoring managers.
//!
//! These tests go through the configuration boundary the gateway uses and
//! check what an out-of-process reader sees.

use gwmon_core::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn enabled_config(dir: &Path, gateway_id: &str) -> MonitoringConfig {
    MonitoringConfig::builder()
        .enabled(true)
        .gateway_id(gateway_id)
        .directory(dir)
        .buffer_sizes(BufferSizes::for_counters(32))
        .build()
}

#[test]
fn test_counters_are_visible_to_reader() {
    let dir = tempdir().unwrap();
    let config = enabled_config(dir.path(), "gw-1");
    let manager = init_monitoring(&config, &["A", "B"]);

    let factories = manager.monitoring_entity_factories();
    let a_requests = factories["A"].create_counter("requests").unwrap();
    let b_errors = factories["B"].create_counter("errors").unwrap();
    let uptime = manager
        .gateway_factory()
        .unwrap()
        .create_counter("uptime.seconds")
        .unwrap();

    a_requests.add(10);
    b_errors.increment();
    uptime.set(3600);

    let reader = MonitorReader::open(config.monitor_file_path()).unwrap();
    let a = reader.service_counters(0).unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].label, "requests");
    assert_eq!(a[0].value, 10);

    let b = reader.service_counters(1).unwrap();
    assert_eq!(b[0].value, 1);

    let gateway = reader.gateway_counters().unwrap();
    assert_eq!(gateway[0].label, "uptime.seconds");
    assert_eq!(gateway[0].value, 3600);

    // The reader shares the mapping and sees later updates.
    a_requests.increment();
    assert_eq!(reader.service_counters(0).unwrap()[0].value, 11);
}

#[test]
fn test_restart_replaces_previous_file() {
    let dir = tempdir().unwrap();
    let config = enabled_config(dir.path(), "gw-restart");

    {
        let manager = init_monitoring(&config, &["A", "B", "C"]);
        manager.monitoring_entity_factories()["C"]
            .create_counter("old")
            .unwrap()
            .set(99);
    }

    let manager = init_monitoring(&config, &["A"]);
    assert_eq!(manager.monitoring_entity_factories().len(), 1);

    let reader = MonitorReader::open(config.monitor_file_path()).unwrap();
    assert_eq!(reader.service_names().unwrap(), vec!["A"]);
    assert!(reader.service_counters(0).unwrap().is_empty());
}

#[test]
fn test_disabled_monitoring_hands_out_nothing() {
    let dir = tempdir().unwrap();
    let config = enabled_config(dir.path(), "gw-off").with_enabled(false);

    let factories = make_monitoring_entity_factories(&config, &["A", "B"]);
    assert!(factories.is_empty());
    assert!(!config.monitor_file_path().exists());
}

#[test]
fn test_unusable_directory_downgrades_to_noop() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"file").unwrap();

    let config = enabled_config(&blocker, "gw-1");
    let manager = init_monitoring(&config, &["A"]);
    assert!(manager.monitoring_entity_factories().is_empty());
    assert!(manager.gateway_factory().is_none());
}

#[test]
fn test_layout_errors_fail_before_io() {
    let dir = tempdir().unwrap();
    let config = enabled_config(dir.path(), "gw-1");

    let err = MmfMonitoringDataManager::new(config.clone(), &["A", "B", "A"]).unwrap_err();
    assert!(err.is_layout_error());

    let services: Vec<String> = (0..124).map(|i| format!("svc-{}", i)).collect();
    let err = MmfMonitoringDataManager::new(config.clone().with_buffer_sizes(BufferSizes::default()), &services)
        .unwrap_err();
    assert_eq!(err.code(), "E101");

    assert!(!config.monitor_file_path().exists());
}
