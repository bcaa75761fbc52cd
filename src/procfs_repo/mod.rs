// Host samplers over /proc: load average, CPU time, disk I/O, filesystems.

pub mod filesystem;
pub mod parser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::instrument;

use crate::error::SampleError;
use crate::models::{CpuUsage, DiskUsage, FileSystemUsage, LoadAverage};

/// Spacing between the two `/proc/diskstats` reads behind disk rates.
pub const DISK_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Reads host counters from a `/proc` tree (normally `/proc`, a fixture dir in tests).
#[derive(Debug, Clone)]
pub struct ProcfsRepo {
    root: PathBuf,
    disk_window: Duration,
}

impl Default for ProcfsRepo {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            disk_window: DISK_SAMPLE_WINDOW,
        }
    }

    /// Overrides the spacing between diskstats reads; rates stay per second.
    pub fn with_disk_window(mut self, window: Duration) -> Self {
        self.disk_window = window;
        self
    }

    #[instrument(skip(self), fields(repo = "procfs", operation = "get_load_average"))]
    pub async fn get_load_average(&self) -> Result<LoadAverage, SampleError> {
        let path = self.root.join("loadavg");
        tokio::task::spawn_blocking(move || {
            let content = read_file(&path)?;
            parser::parse_loadavg(&content).map_err(|reason| SampleError::parse(&path, reason))
        })
        .await?
    }

    #[instrument(skip(self), fields(repo = "procfs", operation = "get_cpu_usage"))]
    pub async fn get_cpu_usage(&self) -> Result<CpuUsage, SampleError> {
        let path = self.root.join("stat");
        tokio::task::spawn_blocking(move || {
            let content = read_file(&path)?;
            parser::parse_cpu_stat(&content).map_err(|reason| SampleError::parse(&path, reason))
        })
        .await?
    }

    /// Two diskstats reads one window apart. Suspends the caller for the whole window.
    #[instrument(skip(self), fields(repo = "procfs", operation = "get_disk_usage"))]
    pub async fn get_disk_usage(&self) -> Result<Vec<DiskUsage>, SampleError> {
        let path = self.root.join("diskstats");
        let first = read_diskstats(path.clone()).await?;
        tokio::time::sleep(self.disk_window).await;
        let second = read_diskstats(path).await?;
        Ok(parser::disk_usage_between(&first, &second, self.disk_window))
    }

    #[instrument(skip(self), fields(repo = "procfs", operation = "get_filesystem_usage"))]
    pub async fn get_filesystem_usage(&self) -> Result<Vec<FileSystemUsage>, SampleError> {
        let path = self.root.join("mounts");
        tokio::task::spawn_blocking(move || {
            let content = read_file(&path)?;
            let mounts = parser::parse_mounts(&content);
            Ok(filesystem::collect_usage(&mounts, filesystem::statvfs))
        })
        .await?
    }
}

async fn read_diskstats(
    path: PathBuf,
) -> Result<std::collections::HashMap<String, parser::DiskCounters>, SampleError> {
    tokio::task::spawn_blocking(move || read_file(&path).map(|c| parser::parse_diskstats(&c)))
        .await?
}

pub(crate) fn read_file(path: &Path) -> Result<String, SampleError> {
    std::fs::read_to_string(path).map_err(|e| SampleError::io(path, e))
}
