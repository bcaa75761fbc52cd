// Raw per-tick snapshot and the averaged snapshot sent to subscribers

use serde::{Deserialize, Serialize};

use super::{CpuUsage, DiskUsage, FileSystemUsage, LoadAverage, Metric, NetworkStats};

/// Result of one sampling pass. Never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Milliseconds since the Unix epoch when the pass started.
    pub timestamp: u64,
    pub load_average: Metric<LoadAverage>,
    pub cpu: Metric<CpuUsage>,
    pub disks: Metric<Vec<DiskUsage>>,
    pub filesystems: Metric<Vec<FileSystemUsage>>,
    pub network: Metric<NetworkStats>,
}

/// Average over the snapshots retained in one subscription window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AveragedSnapshot {
    /// Milliseconds since the Unix epoch when the average was computed.
    pub timestamp: u64,
    pub sample_count: usize,
    pub load_average: Metric<LoadAverage>,
    pub cpu: Metric<CpuUsage>,
    pub disks: Metric<Vec<DiskUsage>>,
    pub filesystems: Metric<Vec<FileSystemUsage>>,
    pub network: Metric<NetworkStats>,
}

/// Current wall-clock time in milliseconds; 0 if the clock is before the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
