// Filesystem usage: statvfs over every mount listed in /proc/mounts.

use std::path::Path;

use crate::models::FileSystemUsage;

use super::parser::MountEntry;

const MB: f64 = 1024.0 * 1024.0;

/// Raw statvfs numbers needed for usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub files: u64,
    pub files_free: u64,
}

pub fn statvfs(mount_point: &Path) -> nix::Result<FsStat> {
    let st = nix::sys::statvfs::statvfs(mount_point)?;
    Ok(FsStat {
        block_size: u64::from(st.fragment_size()),
        blocks: u64::from(st.blocks()),
        blocks_free: u64::from(st.blocks_free()),
        files: u64::from(st.files()),
        files_free: u64::from(st.files_free()),
    })
}

/// Usage figures for one mount; percentages are 0 when the totals are 0.
pub fn usage_from_stat(label: &str, st: FsStat) -> FileSystemUsage {
    let size = st.blocks.saturating_mul(st.block_size);
    let free = st.blocks_free.saturating_mul(st.block_size);
    let used = size.saturating_sub(free);
    let inodes_used = st.files.saturating_sub(st.files_free);

    let used_percent = if size > 0 {
        used as f64 / size as f64 * 100.0
    } else {
        0.0
    };
    let inode_percent = if st.files > 0 {
        inodes_used as f64 / st.files as f64 * 100.0
    } else {
        0.0
    };

    FileSystemUsage {
        file_system: label.to_string(),
        used_mb: used as f64 / MB,
        used_percent,
        used_inodes: inodes_used as f64,
        inode_percent,
    }
}

/// Stats every mount with `stat_fn`. A mount whose stat fails is logged and skipped.
pub fn collect_usage<F>(mounts: &[MountEntry], mut stat_fn: F) -> Vec<FileSystemUsage>
where
    F: FnMut(&Path) -> nix::Result<FsStat>,
{
    let mut out = Vec::with_capacity(mounts.len());
    for m in mounts {
        match stat_fn(Path::new(&m.mount_point)) {
            Ok(st) => out.push(usage_from_stat(&m.source, st)),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    mount_point = %m.mount_point,
                    operation = "statvfs",
                    "skipping mount"
                );
            }
        }
    }
    out
}
