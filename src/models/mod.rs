// Domain models for sampled host metrics

mod metric;
mod network;
mod snapshot;
mod storage;
mod system;

pub use metric::Metric;
pub use network::{
    ConnectionKey, ListeningKey, ListeningSocket, NetworkProtocol, NetworkStats, TcpStates,
    TrafficInfo,
};
pub use snapshot::{AveragedSnapshot, Snapshot, now_millis};
pub use storage::{DiskUsage, FileSystemUsage};
pub use system::{CpuUsage, LoadAverage};
