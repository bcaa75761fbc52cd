// Shared test helpers: a fake /proc tree on disk.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sysstatd::config::{AppConfig, MetricsConfig};
use sysstatd::models::*;
use tempfile::TempDir;

pub const LOADAVG: &str = "0.10 0.20 0.30 1/200 1234\n";

pub const STAT: &str = "cpu  100 20 30 400 5 0 0 0 0 0\ncpu0 50 10 15 200 2 0 0 0 0 0\nintr 0\n";

pub const DISKSTATS_BEFORE: &str = "   8       0 sda 100 0 2000 0 50 0 1000 0 0 0 0\n   8      16 sdb 7 0 70 0 3 0 30 0 0 0 0\n";

pub const DISKSTATS_AFTER: &str = "   8       0 sda 110 0 2100 0 60 0 1200 0 0 0 0\n   8      16 sdb 7 0 70 0 3 0 30 0 0 0 0\n";

/// 127.0.0.1:22 LISTEN (inode 5555), 127.0.0.1:40000 -> 127.0.0.1:22
/// ESTABLISHED with 0x1A bytes queued (inode 6666).
pub const NET_TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 5555 1 0000000000000000 100 0 0 10 0\n\
   1: 0100007F:9C40 0100007F:0016 01 00000000:0000001A 00:00000000 00000000  1000        0 6666 1 0000000000000000 20 4 30 10 -1\n";

/// [::]:8080 LISTEN (inode 7777, no owning process in the tree).
pub const NET_TCP6: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 00000000000000000000000000000000:1F90 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 7777 1 0000000000000000 100 0 0 10 0\n";

/// 0.0.0.0:53 with 6 bytes queued.
pub const NET_UDP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops\n\
   0: 00000000:0035 00000000:0000 07 00000000:00000006 00:00000000 00000000   101        0 8888 2 0000000000000000 0\n";

pub const NET_ICMP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops\n";

pub const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\nalice:x:1000:1000::/home/alice:/bin/zsh\n";

/// A `/proc`-shaped directory plus a passwd file, removed on drop.
pub struct FakeProc {
    dir: TempDir,
}

impl FakeProc {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Every interface the samplers read, with the fixtures above. The
    /// mounts table lists the fixture directory itself so statvfs succeeds.
    pub fn populated() -> Self {
        let p = Self::empty();
        p.write("loadavg", LOADAVG);
        p.write("stat", STAT);
        p.write("diskstats", DISKSTATS_BEFORE);
        p.write(
            "mounts",
            &format!(
                "fixturefs {} ext4 rw,relatime 0 0\nbrokenfs /nonexistent/mount ext4 rw 0 0\n",
                p.root().display()
            ),
        );
        p.write("net/tcp", NET_TCP);
        p.write("net/tcp6", NET_TCP6);
        p.write("net/udp", NET_UDP);
        p.write("net/icmp", NET_ICMP);
        p.write("etc/passwd", PASSWD);
        p.add_process(4321, "sshd", 0, &[5555]);
        p.add_process(9000, "curl", 1000, &[6666]);
        p
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn passwd_path(&self) -> PathBuf {
        self.root().join("etc/passwd")
    }

    /// Writes via rename so concurrent readers never see a partial file.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create_dir_all");
        }
        let tmp = path.with_extension("tmp-write");
        std::fs::write(&tmp, content).expect("write fixture");
        std::fs::rename(&tmp, &path).expect("rename fixture");
    }

    /// `<pid>/comm`, `<pid>/status` and one `fd/<n>` symlink per socket inode.
    pub fn add_process(&self, pid: i32, comm: &str, uid: u32, socket_inodes: &[u64]) {
        let base = pid.to_string();
        self.write(&format!("{base}/comm"), &format!("{comm}\n"));
        self.write(
            &format!("{base}/status"),
            &format!("Name:\t{comm}\nState:\tS (sleeping)\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
        );
        let fd_dir = self.root().join(&base).join("fd");
        std::fs::create_dir_all(&fd_dir).expect("fd dir");
        std::os::unix::fs::symlink("/dev/null", fd_dir.join("0")).expect("fd 0");
        for (i, inode) in socket_inodes.iter().enumerate() {
            std::os::unix::fs::symlink(format!("socket:[{inode}]"), fd_dir.join((i + 3).to_string()))
                .expect("socket fd");
        }
    }

    /// App config pointing at this tree with a short connection window.
    pub fn config(&self, metrics: MetricsConfig) -> AppConfig {
        let toml = format!(
            r#"
[server]
port = 8081
host = "127.0.0.1"

[sampling]
default_period_secs = 1
default_averaging_secs = 2
max_averaging_secs = 60
connection_window_ms = 100
connection_tick_ms = 50

[procfs]
root = "{}"
passwd_path = "{}"
"#,
            self.root().display(),
            self.passwd_path().display()
        );
        let mut config = AppConfig::load_from_str(&toml).expect("fixture config");
        config.metrics = metrics;
        config
    }
}

pub fn all_disabled() -> MetricsConfig {
    MetricsConfig {
        load_average: false,
        cpu: false,
        disk_usage: false,
        filesystem_usage: false,
        network: false,
    }
}

pub fn cpu_snapshot(timestamp: u64, user_mode: f64) -> Snapshot {
    Snapshot {
        timestamp,
        load_average: Metric::Disabled,
        cpu: Metric::Sampled(CpuUsage {
            user_mode,
            system_mode: 1.0,
            idle: 10.0,
        }),
        disks: Metric::Disabled,
        filesystems: Metric::Disabled,
        network: Metric::Disabled,
    }
}

pub fn traffic(source_port: u16, state: &str, bytes: i64, bytes_per_sec: f64) -> TrafficInfo {
    TrafficInfo {
        source_ip: "10.0.0.2".into(),
        source_port,
        dest_ip: "10.0.0.1".into(),
        dest_port: 443,
        protocol: "tcp".into(),
        bytes,
        state: state.into(),
        bytes_per_sec,
    }
}

/// A snapshot with every family sampled, values scaled by `k`.
pub fn full_snapshot(timestamp: u64, k: f64) -> Snapshot {
    Snapshot {
        timestamp,
        load_average: Metric::Sampled(LoadAverage {
            one_minute: k,
            five_minutes: 2.0 * k,
            fifteen_minutes: 3.0 * k,
        }),
        cpu: Metric::Sampled(CpuUsage {
            user_mode: 10.0 * k,
            system_mode: 5.0 * k,
            idle: 100.0 * k,
        }),
        disks: Metric::Sampled(vec![
            DiskUsage {
                name: "nvme0n1".into(),
                tps: 4.0 * k,
                kb_per_sec: 8.0 * k,
            },
            DiskUsage {
                name: "sda".into(),
                tps: k,
                kb_per_sec: 2.0 * k,
            },
        ]),
        filesystems: Metric::Sampled(vec![FileSystemUsage {
            file_system: "/dev/sda1".into(),
            used_mb: 1000.0 * k,
            used_percent: 10.0 * k,
            used_inodes: 50.0 * k,
            inode_percent: k,
        }]),
        network: Metric::Sampled(NetworkStats {
            protocols: vec![
                NetworkProtocol {
                    protocol: "tcp".into(),
                    bytes: (30.0 * k) as i64,
                    percent: 75.0,
                },
                NetworkProtocol {
                    protocol: "udp".into(),
                    bytes: (10.0 * k) as i64,
                    percent: 25.0,
                },
            ],
            connections: vec![
                traffic(2, "ESTABLISHED", (20.0 * k) as i64, 20.0 * k),
                traffic(1, "ESTABLISHED", (10.0 * k) as i64, 10.0 * k),
            ],
            tcp_states: vec![TcpStates {
                state: "ESTABLISHED".into(),
                count: 2,
            }],
            listening_sockets: vec![ListeningSocket {
                command: "sshd".into(),
                pid: 4321,
                user: "root".into(),
                protocol: "tcp".into(),
                port: 22,
            }],
        }),
    }
}
