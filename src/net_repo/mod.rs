// Network resolver: windowed connection sampling, protocol shares, listening sockets.

pub mod process;
pub mod table;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::instrument;

use crate::error::SampleError;
use crate::models::{
    ConnectionKey, ListeningSocket, NetworkProtocol, NetworkStats, TcpStates, TrafficInfo,
};
use crate::procfs_repo::read_file;

/// Connection tables sampled for traffic, relative to the proc root.
pub const PROTOCOL_TABLES: [(&str, &str); 3] =
    [("tcp", "net/tcp"), ("udp", "net/udp"), ("icmp", "net/icmp")];

/// Tables scanned for listening sockets.
pub const LISTEN_TABLES: [(&str, &str); 2] = [("tcp", "net/tcp"), ("tcp6", "net/tcp6")];

/// Connection window timing.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Total time connections are sampled for.
    pub window: Duration,
    /// Spacing between samples inside the window.
    pub tick: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            tick: Duration::from_millis(500),
        }
    }
}

/// Accumulates connection samples across the ticks of one window.
#[derive(Debug, Default)]
pub struct ConnectionWindow {
    connections: HashMap<ConnectionKey, TrafficInfo>,
    protocol_bytes: BTreeMap<String, i64>,
}

/// Result of one connection window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSummary {
    /// Sorted by descending bytes/sec.
    pub connections: Vec<TrafficInfo>,
    pub protocol_bytes: BTreeMap<String, i64>,
    /// Distinct tcp connections per state label.
    pub tcp_states: BTreeMap<String, i64>,
}

impl ConnectionWindow {
    /// Merges one table read; bytes of a connection already seen are summed.
    pub fn add_sample(&mut self, protocol: &str, sample: Vec<TrafficInfo>) {
        let total = self.protocol_bytes.entry(protocol.to_string()).or_insert(0);
        for conn in sample {
            *total += conn.bytes;
            self.connections
                .entry(conn.key())
                .and_modify(|existing| existing.bytes += conn.bytes)
                .or_insert(conn);
        }
    }

    pub fn finish(self, window: Duration) -> ConnectionSummary {
        let secs = window.as_secs_f64();
        let mut tcp_states: BTreeMap<String, i64> = BTreeMap::new();
        let mut connections: Vec<TrafficInfo> = self
            .connections
            .into_values()
            .map(|mut c| {
                c.bytes_per_sec = if secs > 0.0 { c.bytes as f64 / secs } else { 0.0 };
                if c.protocol == "tcp" {
                    *tcp_states.entry(c.state.clone()).or_insert(0) += 1;
                }
                c
            })
            .collect();
        sort_connections(&mut connections);
        ConnectionSummary {
            connections,
            protocol_bytes: self.protocol_bytes,
            tcp_states,
        }
    }
}

/// Descending bytes/sec; ties broken by the merge key so output is stable.
pub fn sort_connections(connections: &mut [TrafficInfo]) {
    connections.sort_by(|a, b| {
        b.bytes_per_sec
            .total_cmp(&a.bytes_per_sec)
            .then_with(|| a.key().cmp(&b.key()))
    });
}

/// Share of all bytes per protocol. With zero total bytes the share is the
/// raw byte count.
pub fn protocol_shares(protocol_bytes: &BTreeMap<String, i64>) -> Vec<NetworkProtocol> {
    let total: i64 = protocol_bytes.values().sum();
    protocol_bytes
        .iter()
        .map(|(protocol, &bytes)| NetworkProtocol {
            protocol: protocol.clone(),
            bytes,
            percent: if total != 0 {
                bytes as f64 / total as f64 * 100.0
            } else {
                bytes as f64
            },
        })
        .collect()
}

/// Listening tcp/tcp6 sockets with their owners. Unreadable tables are skipped.
///
/// Every socket triggers a full process/fd walk (see
/// [`process::find_process_by_inode`]); there is no inode index.
pub fn listening_sockets(proc_root: &Path, passwd_path: &Path) -> Vec<ListeningSocket> {
    let users = process::UserResolver::load(passwd_path);
    let mut out = Vec::new();
    for (protocol, rel) in LISTEN_TABLES {
        let path = proc_root.join(rel);
        let content = match read_file(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, operation = "listening_sockets", "table skipped");
                continue;
            }
        };
        for entry in table::parse_socket_table(&content) {
            if entry.state != table::TCP_LISTEN {
                continue;
            }
            let owner = process::resolve_owner(proc_root, &users, entry.inode);
            out.push(ListeningSocket {
                command: owner.command,
                pid: owner.pid,
                user: owner.user,
                protocol: protocol.to_string(),
                port: entry.port,
            });
        }
    }
    out
}

/// Reads connection tables and resolves socket owners under a proc root.
#[derive(Debug, Clone)]
pub struct NetRepo {
    root: PathBuf,
    passwd_path: PathBuf,
    window: WindowConfig,
}

impl NetRepo {
    pub fn new(root: impl Into<PathBuf>, passwd_path: impl Into<PathBuf>, window: WindowConfig) -> Self {
        Self {
            root: root.into(),
            passwd_path: passwd_path.into(),
            window,
        }
    }

    /// Samples every protocol table each tick until the window has elapsed.
    ///
    /// Fails only if no table could be read on any tick.
    #[instrument(skip(self), fields(repo = "net", operation = "aggregate_connections"))]
    pub async fn aggregate_connections(&self) -> Result<ConnectionSummary, SampleError> {
        let mut tick = interval(self.window.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let start = Instant::now();
        let mut acc = ConnectionWindow::default();
        let mut last_error = None;
        let mut tables_read = 0usize;

        loop {
            tick.tick().await;
            let root = self.root.clone();
            let reads = tokio::task::spawn_blocking(move || {
                PROTOCOL_TABLES
                    .iter()
                    .map(|(protocol, rel)| {
                        let path = root.join(rel);
                        let read = read_file(&path)
                            .map(|content| table::parse_connection_table(protocol, &content));
                        (*protocol, read)
                    })
                    .collect::<Vec<_>>()
            })
            .await?;

            for (protocol, read) in reads {
                match read {
                    Ok(sample) => {
                        tables_read += 1;
                        acc.add_sample(protocol, sample);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, protocol, "connection table unreadable");
                        last_error = Some(e);
                    }
                }
            }
            if start.elapsed() >= self.window.window {
                break;
            }
        }

        match (tables_read, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(acc.finish(self.window.window)),
        }
    }

    #[instrument(skip(self), fields(repo = "net", operation = "get_listening_sockets"))]
    pub async fn get_listening_sockets(&self) -> Result<Vec<ListeningSocket>, SampleError> {
        let root = self.root.clone();
        let passwd = self.passwd_path.clone();
        Ok(tokio::task::spawn_blocking(move || listening_sockets(&root, &passwd)).await?)
    }

    /// Connection window plus listening sockets. Socket resolution never fails
    /// the family; it degrades to an empty list.
    pub async fn get_network_stats(&self) -> Result<NetworkStats, SampleError> {
        let (summary, sockets) =
            tokio::join!(self.aggregate_connections(), self.get_listening_sockets());
        let summary = summary?;
        let listening_sockets = sockets.unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_listening_sockets", "listening sockets failed");
            Vec::new()
        });
        Ok(NetworkStats {
            protocols: protocol_shares(&summary.protocol_bytes),
            tcp_states: summary
                .tcp_states
                .into_iter()
                .map(|(state, count)| TcpStates { state, count })
                .collect(),
            connections: summary.connections,
            listening_sockets,
        })
    }
}
