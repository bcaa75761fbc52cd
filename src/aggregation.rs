// Sample aggregation: folds the snapshots of one window into one averaged snapshot.
// Pure logic; buffering and timing live in buffer/session.

use std::collections::BTreeMap;

use crate::models::{
    AveragedSnapshot, ConnectionKey, CpuUsage, DiskUsage, FileSystemUsage, ListeningKey,
    ListeningSocket, LoadAverage, Metric, NetworkStats, Snapshot, TcpStates, TrafficInfo,
    now_millis,
};
use crate::net_repo::{protocol_shares, sort_connections};

/// Presence bookkeeping shared by every family.
#[derive(Debug, Clone, Default)]
struct Presence {
    /// Samples in which the family was enabled (sampled or failed).
    enabled: usize,
    /// Samples that carried a value; the divisor for every mean.
    sampled: usize,
}

impl Presence {
    fn observe<T>(&mut self, metric: &Metric<T>) -> bool {
        if !metric.is_disabled() {
            self.enabled += 1;
        }
        if metric.is_sampled() {
            self.sampled += 1;
            return true;
        }
        false
    }

    fn merge(&mut self, other: &Presence) {
        self.enabled += other.enabled;
        self.sampled += other.sampled;
    }

    /// `Disabled` only when every sample had the family switched off.
    fn resolve<T>(&self, total: usize, value: impl FnOnce(f64) -> T) -> Metric<T> {
        if total > 0 && self.enabled == 0 {
            Metric::Disabled
        } else if self.sampled == 0 {
            Metric::NoData
        } else {
            Metric::Sampled(value(self.sampled as f64))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DiskSums {
    tps: f64,
    kb_per_sec: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct FileSystemSums {
    used_mb: f64,
    used_percent: f64,
    used_inodes: f64,
    inode_percent: f64,
}

#[derive(Debug, Clone)]
struct ConnectionSums {
    first: TrafficInfo,
    bytes: i64,
    bytes_per_sec: f64,
}

#[derive(Debug, Clone, Default)]
struct NetworkSums {
    connections: BTreeMap<ConnectionKey, ConnectionSums>,
    protocol_bytes: BTreeMap<String, i64>,
    tcp_states: BTreeMap<String, i64>,
    listening: BTreeMap<ListeningKey, ListeningSocket>,
}

/// Running sums for one window.
///
/// Scalars and per-entity rates are summed and divided once in [`finish`],
/// by the number of samples in which their family carried a value. Byte and
/// state counters are summed. Listening sockets are deduplicated, first seen
/// wins. Output lists are ordered by entity key, connections by descending
/// bytes/sec, so the result does not depend on map iteration order.
///
/// [`finish`]: SnapshotAccumulator::finish
#[derive(Debug, Clone, Default)]
pub struct SnapshotAccumulator {
    samples: usize,
    load_presence: Presence,
    load: LoadAverage,
    cpu_presence: Presence,
    cpu: CpuUsage,
    disk_presence: Presence,
    disks: BTreeMap<String, DiskSums>,
    fs_presence: Presence,
    filesystems: BTreeMap<String, FileSystemSums>,
    net_presence: Presence,
    network: NetworkSums,
}

impl SnapshotAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: &Snapshot) {
        self.samples += 1;

        if self.load_presence.observe(&snapshot.load_average)
            && let Some(l) = snapshot.load_average.value()
        {
            self.load.one_minute += l.one_minute;
            self.load.five_minutes += l.five_minutes;
            self.load.fifteen_minutes += l.fifteen_minutes;
        }

        if self.cpu_presence.observe(&snapshot.cpu)
            && let Some(c) = snapshot.cpu.value()
        {
            self.cpu.user_mode += c.user_mode;
            self.cpu.system_mode += c.system_mode;
            self.cpu.idle += c.idle;
        }

        if self.disk_presence.observe(&snapshot.disks)
            && let Some(disks) = snapshot.disks.value()
        {
            for d in disks {
                let sums = self.disks.entry(d.name.clone()).or_default();
                sums.tps += d.tps;
                sums.kb_per_sec += d.kb_per_sec;
            }
        }

        if self.fs_presence.observe(&snapshot.filesystems)
            && let Some(filesystems) = snapshot.filesystems.value()
        {
            // A source mounted twice (bind mounts, tmpfs) counts once per sample.
            let mut seen = std::collections::HashSet::new();
            for f in filesystems {
                if !seen.insert(f.file_system.as_str()) {
                    continue;
                }
                let sums = self.filesystems.entry(f.file_system.clone()).or_default();
                sums.used_mb += f.used_mb;
                sums.used_percent += f.used_percent;
                sums.used_inodes += f.used_inodes;
                sums.inode_percent += f.inode_percent;
            }
        }

        if self.net_presence.observe(&snapshot.network)
            && let Some(net) = snapshot.network.value()
        {
            self.push_network(net);
        }
    }

    fn push_network(&mut self, net: &NetworkStats) {
        let acc = &mut self.network;
        for c in &net.connections {
            acc.connections
                .entry(c.key())
                .and_modify(|s| {
                    s.bytes += c.bytes;
                    s.bytes_per_sec += c.bytes_per_sec;
                })
                .or_insert_with(|| ConnectionSums {
                    first: c.clone(),
                    bytes: c.bytes,
                    bytes_per_sec: c.bytes_per_sec,
                });
        }
        for p in &net.protocols {
            *acc.protocol_bytes.entry(p.protocol.clone()).or_insert(0) += p.bytes;
        }
        for s in &net.tcp_states {
            *acc.tcp_states.entry(s.state.clone()).or_insert(0) += s.count;
        }
        for l in &net.listening_sockets {
            acc.listening.entry(l.key()).or_insert_with(|| l.clone());
        }
    }

    /// Folds another partial window into this one. Equivalent to having pushed
    /// `other`'s snapshots after this one's.
    pub fn merge(&mut self, other: SnapshotAccumulator) {
        self.samples += other.samples;

        self.load_presence.merge(&other.load_presence);
        self.load.one_minute += other.load.one_minute;
        self.load.five_minutes += other.load.five_minutes;
        self.load.fifteen_minutes += other.load.fifteen_minutes;

        self.cpu_presence.merge(&other.cpu_presence);
        self.cpu.user_mode += other.cpu.user_mode;
        self.cpu.system_mode += other.cpu.system_mode;
        self.cpu.idle += other.cpu.idle;

        self.disk_presence.merge(&other.disk_presence);
        for (name, d) in other.disks {
            let sums = self.disks.entry(name).or_default();
            sums.tps += d.tps;
            sums.kb_per_sec += d.kb_per_sec;
        }

        self.fs_presence.merge(&other.fs_presence);
        for (label, f) in other.filesystems {
            let sums = self.filesystems.entry(label).or_default();
            sums.used_mb += f.used_mb;
            sums.used_percent += f.used_percent;
            sums.used_inodes += f.used_inodes;
            sums.inode_percent += f.inode_percent;
        }

        self.net_presence.merge(&other.net_presence);
        let acc = &mut self.network;
        for (key, c) in other.network.connections {
            acc.connections
                .entry(key)
                .and_modify(|s| {
                    s.bytes += c.bytes;
                    s.bytes_per_sec += c.bytes_per_sec;
                })
                .or_insert(c);
        }
        for (protocol, bytes) in other.network.protocol_bytes {
            *acc.protocol_bytes.entry(protocol).or_insert(0) += bytes;
        }
        for (state, count) in other.network.tcp_states {
            *acc.tcp_states.entry(state).or_insert(0) += count;
        }
        for (key, socket) in other.network.listening {
            acc.listening.entry(key).or_insert(socket);
        }
    }

    /// Averaged snapshot stamped with the current time.
    pub fn finish(self) -> AveragedSnapshot {
        self.finish_at(now_millis())
    }

    /// Averaged snapshot with an explicit timestamp. An empty accumulator
    /// yields every family as `noData` and a sample count of 0.
    pub fn finish_at(self, timestamp: u64) -> AveragedSnapshot {
        let total = self.samples;
        let load = self.load;
        let cpu = self.cpu;
        let disks = self.disks;
        let filesystems = self.filesystems;
        let network = self.network;

        AveragedSnapshot {
            timestamp,
            sample_count: total,
            load_average: self.load_presence.resolve(total, |n| LoadAverage {
                one_minute: load.one_minute / n,
                five_minutes: load.five_minutes / n,
                fifteen_minutes: load.fifteen_minutes / n,
            }),
            cpu: self.cpu_presence.resolve(total, |n| CpuUsage {
                user_mode: cpu.user_mode / n,
                system_mode: cpu.system_mode / n,
                idle: cpu.idle / n,
            }),
            disks: self.disk_presence.resolve(total, |n| {
                disks
                    .into_iter()
                    .map(|(name, d)| DiskUsage {
                        name,
                        tps: d.tps / n,
                        kb_per_sec: d.kb_per_sec / n,
                    })
                    .collect()
            }),
            filesystems: self.fs_presence.resolve(total, |n| {
                filesystems
                    .into_iter()
                    .map(|(file_system, f)| FileSystemUsage {
                        file_system,
                        used_mb: f.used_mb / n,
                        used_percent: f.used_percent / n,
                        used_inodes: f.used_inodes / n,
                        inode_percent: f.inode_percent / n,
                    })
                    .collect()
            }),
            network: self
                .net_presence
                .resolve(total, |n| finish_network(network, n)),
        }
    }
}

fn finish_network(acc: NetworkSums, n: f64) -> NetworkStats {
    let mut connections: Vec<TrafficInfo> = acc
        .connections
        .into_values()
        .map(|s| TrafficInfo {
            bytes: s.bytes,
            bytes_per_sec: s.bytes_per_sec / n,
            ..s.first
        })
        .collect();
    sort_connections(&mut connections);
    NetworkStats {
        protocols: protocol_shares(&acc.protocol_bytes),
        connections,
        tcp_states: acc
            .tcp_states
            .into_iter()
            .map(|(state, count)| TcpStates { state, count })
            .collect(),
        listening_sockets: acc.listening.into_values().collect(),
    }
}

/// Averages a window of snapshots in one pass.
pub fn aggregate<'a>(snapshots: impl IntoIterator<Item = &'a Snapshot>) -> AveragedSnapshot {
    let mut acc = SnapshotAccumulator::new();
    for s in snapshots {
        acc.push(s);
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_only(user: f64) -> Snapshot {
        Snapshot {
            timestamp: 1,
            load_average: Metric::Disabled,
            cpu: Metric::Sampled(CpuUsage {
                user_mode: user,
                system_mode: 10.0,
                idle: 100.0,
            }),
            disks: Metric::Disabled,
            filesystems: Metric::Disabled,
            network: Metric::Disabled,
        }
    }

    #[test]
    fn scalars_are_divided_once() {
        let window = [cpu_only(1.0), cpu_only(2.0), cpu_only(6.0)];
        let avg = aggregate(window.iter());
        let cpu = avg.cpu.value().unwrap();
        assert_eq!(cpu.user_mode, 3.0);
        assert_eq!(cpu.system_mode, 10.0);
        assert_eq!(avg.sample_count, 3);
        assert!(avg.disks.is_disabled());
    }

    #[test]
    fn failed_samples_do_not_dilute_the_mean() {
        let mut failed = cpu_only(0.0);
        failed.cpu = Metric::NoData;
        let window = [cpu_only(4.0), failed];
        let avg = aggregate(window.iter());
        assert_eq!(avg.cpu.value().unwrap().user_mode, 4.0);
    }

    #[test]
    fn family_disabled_only_when_disabled_everywhere() {
        let mut enabled_but_failed = cpu_only(1.0);
        enabled_but_failed.load_average = Metric::NoData;
        let window = [cpu_only(1.0), enabled_but_failed];
        let avg = aggregate(window.iter());
        assert_eq!(avg.load_average, Metric::NoData);
        assert!(avg.network.is_disabled());
    }

    #[test]
    fn empty_window_is_all_no_data() {
        let avg = SnapshotAccumulator::new().finish_at(42);
        assert_eq!(avg.timestamp, 42);
        assert_eq!(avg.sample_count, 0);
        assert_eq!(avg.cpu, Metric::NoData);
        assert_eq!(avg.load_average, Metric::NoData);
        assert_eq!(avg.network, Metric::NoData);
    }
}
