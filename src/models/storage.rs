// Disk I/O and filesystem usage models

use serde::{Deserialize, Serialize};

/// Per-device I/O rate over the disk measurement window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub name: String,
    /// Read + write I/Os per second.
    pub tps: f64,
    pub kb_per_sec: f64,
}

/// Space and inode usage of one mounted filesystem, keyed by its source label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemUsage {
    pub file_system: String,
    pub used_mb: f64,
    pub used_percent: f64,
    pub used_inodes: f64,
    pub inode_percent: f64,
}
