use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub procfs: ProcfsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Which metric families are sampled. Disabled families are reported as such
/// and never read.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "enabled")]
    pub load_average: bool,
    #[serde(default = "enabled")]
    pub cpu: bool,
    #[serde(default = "enabled")]
    pub disk_usage: bool,
    #[serde(default = "enabled")]
    pub filesystem_usage: bool,
    #[serde(default = "enabled")]
    pub network: bool,
}

fn enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            load_average: true,
            cpu: true,
            disk_usage: true,
            filesystem_usage: true,
            network: true,
        }
    }
}

impl MetricsConfig {
    /// Only CPU enabled; handy for tests and light deployments.
    pub fn cpu_only() -> Self {
        Self {
            load_average: false,
            cpu: true,
            disk_usage: false,
            filesystem_usage: false,
            network: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Period used when a subscriber does not pass one.
    #[serde(default = "default_period_secs")]
    pub default_period_secs: u64,
    /// Averaging window used when a subscriber does not pass one.
    #[serde(default = "default_averaging_secs")]
    pub default_averaging_secs: u64,
    /// Upper bound on a subscriber's averaging window (bounds buffer size).
    #[serde(default = "default_max_averaging_secs")]
    pub max_averaging_secs: u64,
    /// Total duration of one connection-table window.
    #[serde(default = "default_connection_window_ms")]
    pub connection_window_ms: u64,
    /// Spacing of connection-table reads inside the window.
    #[serde(default = "default_connection_tick_ms")]
    pub connection_tick_ms: u64,
}

fn default_period_secs() -> u64 {
    5
}

fn default_averaging_secs() -> u64 {
    15
}

fn default_max_averaging_secs() -> u64 {
    3600
}

fn default_connection_window_ms() -> u64 {
    1000
}

fn default_connection_tick_ms() -> u64 {
    500
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_period_secs: default_period_secs(),
            default_averaging_secs: default_averaging_secs(),
            max_averaging_secs: default_max_averaging_secs(),
            connection_window_ms: default_connection_window_ms(),
            connection_tick_ms: default_connection_tick_ms(),
        }
    }
}

impl SamplingConfig {
    pub fn connection_window(&self) -> Duration {
        Duration::from_millis(self.connection_window_ms)
    }

    pub fn connection_tick(&self) -> Duration {
        Duration::from_millis(self.connection_tick_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcfsConfig {
    #[serde(default = "default_proc_root")]
    pub root: PathBuf,
    #[serde(default = "default_passwd_path")]
    pub passwd_path: PathBuf,
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_passwd_path() -> PathBuf {
    PathBuf::from("/etc/passwd")
}

impl Default for ProcfsConfig {
    fn default() -> Self {
        Self {
            root: default_proc_root(),
            passwd_path: default_passwd_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (active subscriptions) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Loads from `CONFIG_FILE`, falling back to `config.toml`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        Self::load_from_path(Path::new(&path))
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.sampling.default_period_secs > 0,
            "sampling.default_period_secs must be > 0, got {}",
            self.sampling.default_period_secs
        );
        anyhow::ensure!(
            self.sampling.default_averaging_secs > 0,
            "sampling.default_averaging_secs must be > 0, got {}",
            self.sampling.default_averaging_secs
        );
        anyhow::ensure!(
            self.sampling.max_averaging_secs >= self.sampling.default_averaging_secs,
            "sampling.max_averaging_secs must be >= default_averaging_secs ({}), got {}",
            self.sampling.default_averaging_secs,
            self.sampling.max_averaging_secs
        );
        anyhow::ensure!(
            self.sampling.connection_window_ms > 0,
            "sampling.connection_window_ms must be > 0, got {}",
            self.sampling.connection_window_ms
        );
        anyhow::ensure!(
            self.sampling.connection_tick_ms > 0
                && self.sampling.connection_tick_ms <= self.sampling.connection_window_ms,
            "sampling.connection_tick_ms must be in 1..={}, got {}",
            self.sampling.connection_window_ms,
            self.sampling.connection_tick_ms
        );
        anyhow::ensure!(
            !self.procfs.root.as_os_str().is_empty(),
            "procfs.root must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
