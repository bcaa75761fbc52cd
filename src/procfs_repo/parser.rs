//! Parsers for the fixed-layout `/proc` files behind the host samplers.
//!
//! Pure functions over file contents so they can be tested with string fixtures.
//! Errors carry only a reason; the caller attaches the path.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::{CpuUsage, DiskUsage, LoadAverage};

/// Parses `/proc/loadavg`: `0.10 0.20 0.30 1/200 1234`.
pub fn parse_loadavg(content: &str) -> Result<LoadAverage, String> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(format!("expected 3 load fields, got {}", fields.len()));
    }
    let parse = |idx: usize, name: &str| -> Result<f64, String> {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| format!("invalid {} load value {:?}", name, fields[idx]))
    };
    Ok(LoadAverage {
        one_minute: parse(0, "1-minute")?,
        five_minutes: parse(1, "5-minute")?,
        fifteen_minutes: parse(2, "15-minute")?,
    })
}

/// Parses the aggregate `cpu` line (first line) of `/proc/stat`.
///
/// Format: `cpu user nice system idle iowait ...`; user and nice are combined.
pub fn parse_cpu_stat(content: &str) -> Result<CpuUsage, String> {
    let line = content.lines().next().ok_or("empty stat file")?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(format!("expected 5+ cpu fields, got {}", fields.len()));
    }
    if !fields[0].starts_with("cpu") {
        return Err(format!("first line is {:?}, not cpu", fields[0]));
    }
    let ticks = |idx: usize, name: &str| -> Result<u64, String> {
        fields[idx]
            .parse::<u64>()
            .map_err(|_| format!("invalid {} ticks {:?}", name, fields[idx]))
    };
    let user = ticks(1, "user")?;
    let nice = ticks(2, "nice")?;
    let system = ticks(3, "system")?;
    let idle = ticks(4, "idle")?;
    Ok(CpuUsage {
        user_mode: (user + nice) as f64,
        system_mode: system as f64,
        idle: idle as f64,
    })
}

/// Cumulative I/O counters of one block device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_ios: u64,
    pub read_sectors: u64,
    pub write_ios: u64,
    pub write_sectors: u64,
}

/// Parses `/proc/diskstats` into device name -> counters.
///
/// Columns: 2 = device, 3 = reads completed, 5 = sectors read,
/// 7 = writes completed, 9 = sectors written. Short or non-numeric lines are skipped.
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskCounters> {
    let mut devices = HashMap::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let get = |idx: usize| fields[idx].parse::<u64>().ok();
        let (Some(read_ios), Some(read_sectors), Some(write_ios), Some(write_sectors)) =
            (get(3), get(5), get(7), get(9))
        else {
            continue;
        };
        devices.insert(
            fields[2].to_string(),
            DiskCounters {
                read_ios,
                read_sectors,
                write_ios,
                write_sectors,
            },
        );
    }
    devices
}

/// Per-device rates between two diskstats reads taken `window` apart.
///
/// Devices only in `second` are dropped; devices missing from `second`
/// report zero. Counter wrap also reports zero rather than underflowing.
pub fn disk_usage_between(
    first: &HashMap<String, DiskCounters>,
    second: &HashMap<String, DiskCounters>,
    window: Duration,
) -> Vec<DiskUsage> {
    let secs = window.as_secs_f64();
    let mut out: Vec<DiskUsage> = first
        .iter()
        .map(|(name, before)| {
            let after = second.get(name).unwrap_or(before);
            let read_ios = after.read_ios.saturating_sub(before.read_ios) as f64;
            let write_ios = after.write_ios.saturating_sub(before.write_ios) as f64;
            let read_sectors = after.read_sectors.saturating_sub(before.read_sectors) as f64;
            let write_sectors = after.write_sectors.saturating_sub(before.write_sectors) as f64;
            let (tps, kb) = (write_ios + read_ios, write_sectors + read_sectors / 1024.0);
            DiskUsage {
                name: name.clone(),
                tps: if secs > 0.0 { tps / secs } else { 0.0 },
                kb_per_sec: if secs > 0.0 { kb / secs } else { 0.0 },
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// One `/proc/mounts` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub mount_point: String,
}

/// Parses `/proc/mounts` (field 0 = source, field 1 = mount point).
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            Some(MountEntry {
                source: unescape_octal(source),
                mount_point: unescape_octal(mount_point),
            })
        })
        .collect()
}

/// The kernel writes space, tab, newline and backslash in mount fields as `\ooo`.
fn unescape_octal(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 4 <= bytes.len()
            && let Ok(digits) = std::str::from_utf8(&bytes[i + 1..i + 4])
            && let Ok(code) = u8::from_str_radix(digits, 8)
        {
            out.push(code);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
