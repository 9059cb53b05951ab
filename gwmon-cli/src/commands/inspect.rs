//! Inspect command - decode a monitor file and show its regions and counters.

use anyhow::{Context, Result};
use gwmon_core::reader::{MonitorReader, MonitorSnapshot, OwnerSnapshot, RegionRefs};
use std::fmt::{self, Write};
use std::path::Path;

/// Run the inspect command.
pub fn run(path: &Path, counters: bool, json: bool) -> Result<()> {
    tracing::info!(path = %path.display(), counters, "Inspecting monitor file");

    if !path.exists() {
        anyhow::bail!("Monitor file not found: {}", path.display());
    }

    let reader = MonitorReader::open(path)
        .with_context(|| format!("Failed to open monitor file: {}", path.display()))?;
    let snapshot = reader
        .snapshot(counters)
        .with_context(|| format!("Failed to read monitor file: {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let mut report = String::new();
        render(&mut report, &snapshot, counters)?;
        print!("{}", report);
    }
    Ok(())
}

/// Render a snapshot as the human-readable report.
fn render(out: &mut impl Write, snapshot: &MonitorSnapshot, counters: bool) -> fmt::Result {
    writeln!(out, "Monitor File")?;
    writeln!(out, "============")?;
    writeln!(out, "Path:       {}", snapshot.path.display())?;
    writeln!(out, "Version:    {}", snapshot.version)?;
    writeln!(out, "Length:     {}", format_bytes(snapshot.length as u64))?;
    writeln!(out, "Gateway:    {}", snapshot.gateway.name)?;
    writeln!(out, "Services:   {}", snapshot.services.len())?;
    writeln!(out)?;

    writeln!(out, "Regions")?;
    writeln!(out, "=======")?;
    render_owner(out, "gateway", &snapshot.gateway, counters)?;
    for (i, service) in snapshot.services.iter().enumerate() {
        render_owner(out, &format!("service {}", i), service, counters)?;
    }

    if !counters {
        writeln!(out)?;
        writeln!(out, "Use --counters (-c) flag to list counter values.")?;
    }
    Ok(())
}

fn render_owner(out: &mut impl Write, heading: &str, owner: &OwnerSnapshot, counters: bool) -> fmt::Result {
    writeln!(out, "  {} '{}'", heading, owner.name)?;
    render_regions(out, &owner.regions)?;

    if !counters {
        return Ok(());
    }
    match &owner.counters {
        Some(list) if list.is_empty() => writeln!(out, "    (no counters)"),
        Some(list) => {
            let width = list.iter().map(|c| c.label.len()).max().unwrap_or(0);
            for counter in list {
                writeln!(out, "    {:<width$}  {}", counter.label, counter.value, width = width)?;
            }
            Ok(())
        }
        None => writeln!(out, "    (counters not yet published)"),
    }
}

fn render_regions(out: &mut impl Write, refs: &RegionRefs) -> fmt::Result {
    for (name, offset, length) in [
        ("labels", refs.labels_offset, refs.labels_length),
        ("values", refs.values_offset, refs.values_length),
    ] {
        let offset = match offset {
            Some(offset) => format!("0x{:08x}", offset),
            None => "unpublished".to_string(),
        };
        writeln!(out, "    {:<7} {:<12} {}", name, offset, format_bytes(length as u64))?;
    }
    Ok(())
}

/// Format a byte count with a binary unit.
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} B", bytes)
    }
}
