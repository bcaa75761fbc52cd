// One sampling pass over every enabled metric family.

use std::future::Future;

use crate::config::{AppConfig, MetricsConfig};
use crate::error::SampleError;
use crate::models::{Metric, Snapshot, now_millis};
use crate::net_repo::{NetRepo, WindowConfig};
use crate::procfs_repo::ProcfsRepo;

/// Samples the host. Cheap to share behind an `Arc`; holds no mutable state.
#[derive(Debug, Clone)]
pub struct Collector {
    procfs: ProcfsRepo,
    net: NetRepo,
    metrics: MetricsConfig,
}

impl Collector {
    pub fn new(procfs: ProcfsRepo, net: NetRepo, metrics: MetricsConfig) -> Self {
        Self {
            procfs,
            net,
            metrics,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let procfs = ProcfsRepo::new(&config.procfs.root);
        let net = NetRepo::new(
            &config.procfs.root,
            &config.procfs.passwd_path,
            WindowConfig {
                window: config.sampling.connection_window(),
                tick: config.sampling.connection_tick(),
            },
        );
        Self::new(procfs, net, config.metrics.clone())
    }

    /// Families are sampled concurrently, so a pass lasts about as long as the
    /// slowest family (disk and network each hold a measurement window).
    pub async fn collect(&self) -> Snapshot {
        let timestamp = now_millis();
        let m = &self.metrics;
        let (load_average, cpu, disks, filesystems, network) = tokio::join!(
            family(m.load_average, "get_load_average", self.procfs.get_load_average()),
            family(m.cpu, "get_cpu_usage", self.procfs.get_cpu_usage()),
            family(m.disk_usage, "get_disk_usage", self.procfs.get_disk_usage()),
            family(
                m.filesystem_usage,
                "get_filesystem_usage",
                self.procfs.get_filesystem_usage()
            ),
            family(m.network, "get_network_stats", self.net.get_network_stats()),
        );
        Snapshot {
            timestamp,
            load_average,
            cpu,
            disks,
            filesystems,
            network,
        }
    }
}

async fn family<T>(
    enabled: bool,
    operation: &'static str,
    sample: impl Future<Output = Result<T, SampleError>>,
) -> Metric<T> {
    if !enabled {
        return Metric::Disabled;
    }
    match sample.await {
        Ok(v) => Metric::Sampled(v),
        Err(e) => {
            tracing::warn!(error = %e, operation, "sampling failed");
            Metric::NoData
        }
    }
}
