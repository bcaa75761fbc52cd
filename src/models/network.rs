// Connection, protocol and listening socket models

use serde::{Deserialize, Serialize};

/// Byte total and share of all sampled bytes for one protocol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProtocol {
    pub protocol: String,
    pub bytes: i64,
    pub percent: f64,
}

/// One connection from a `/proc/net/{tcp,udp,icmp}` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfo {
    pub source_ip: String,
    pub source_port: u16,
    pub dest_ip: String,
    pub dest_port: u16,
    pub protocol: String,
    /// Receive-queue bytes, summed over every tick the connection was seen.
    pub bytes: i64,
    pub state: String,
    pub bytes_per_sec: f64,
}

/// Merge identity of a connection: 5-tuple plus state.
pub type ConnectionKey = (String, u16, String, u16, String, String);

impl TrafficInfo {
    pub fn key(&self) -> ConnectionKey {
        (
            self.source_ip.clone(),
            self.source_port,
            self.dest_ip.clone(),
            self.dest_port,
            self.protocol.clone(),
            self.state.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpStates {
    pub state: String,
    pub count: i64,
}

/// Merge identity of a listening socket: pid, command, user.
pub type ListeningKey = (i32, String, String);

/// A listening TCP socket attributed to its owning process.
///
/// `command`/`user` are `"unknown"` and `pid` is -1 when resolution fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListeningSocket {
    pub command: String,
    pub pid: i32,
    pub user: String,
    pub protocol: String,
    pub port: u16,
}

impl ListeningSocket {
    /// Identity across samples: owning pid, command and user. A process
    /// listening on both `tcp` and `tcp6` is one entry.
    pub fn key(&self) -> ListeningKey {
        (self.pid, self.command.clone(), self.user.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub protocols: Vec<NetworkProtocol>,
    /// Sorted by descending `bytes_per_sec`.
    pub connections: Vec<TrafficInfo>,
    pub tcp_states: Vec<TcpStates>,
    pub listening_sockets: Vec<ListeningSocket>,
}
