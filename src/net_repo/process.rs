// Socket inode -> owning process, and uid -> username.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ResolveError;

/// Finds the process holding socket `inode` by walking every
/// `<proc_root>/<pid>/fd/*` symlink looking for `socket:[<inode>]`.
///
/// Cost is O(processes x open fds) per call, so a full socket scan is
/// O(sockets x processes x fds). Unreadable fd directories (other users'
/// processes without privileges) are skipped.
pub fn find_process_by_inode(proc_root: &Path, inode: u64) -> Result<(i32, String), ResolveError> {
    let target = format!("socket:[{}]", inode);
    let entries = std::fs::read_dir(proc_root).map_err(|source| ResolveError::Io {
        path: proc_root.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };
        let owns_socket = fds.flatten().any(|fd| {
            std::fs::read_link(fd.path())
                .map(|link| link.as_os_str() == target.as_str())
                .unwrap_or(false)
        });
        if owns_socket {
            let comm_path = entry.path().join("comm");
            let command = std::fs::read_to_string(&comm_path).map_err(|source| {
                ResolveError::Io {
                    path: comm_path,
                    source,
                }
            })?;
            return Ok((pid, command.trim().to_string()));
        }
    }
    Err(ResolveError::ProcessNotFound(inode))
}

/// Real uid (first `Uid:` field) of a process from `<proc_root>/<pid>/status`.
pub fn read_uid(proc_root: &Path, pid: i32) -> Result<u32, ResolveError> {
    let path = proc_root.join(pid.to_string()).join("status");
    let content = std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
        path: path.clone(),
        source,
    })?;
    parse_status_uid(&content).ok_or(ResolveError::MissingUid(path))
}

fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Parses passwd content (`name:pw:uid:gid:gecos:home:shell`) into uid -> name.
pub fn parse_passwd(content: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 3
            && let Ok(uid) = parts[2].parse::<u32>()
        {
            map.entry(uid).or_insert_with(|| parts[0].to_string());
        }
    }
    map
}

/// uid -> username from a passwd file, loaded once per socket scan.
#[derive(Debug, Clone, Default)]
pub struct UserResolver {
    uid_to_name: HashMap<u32, String>,
}

impl UserResolver {
    /// Loads `path`; an unreadable file gives an empty resolver (every lookup fails).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_content(&content),
            Err(e) => {
                tracing::debug!(error = %e, path = %path.display(), "passwd unreadable");
                Self::default()
            }
        }
    }

    pub fn from_content(content: &str) -> Self {
        Self {
            uid_to_name: parse_passwd(content),
        }
    }

    pub fn lookup(&self, uid: u32) -> Result<String, ResolveError> {
        self.uid_to_name
            .get(&uid)
            .cloned()
            .ok_or(ResolveError::UserNotFound(uid))
    }
}

/// Sentinel-degraded owner of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOwner {
    pub pid: i32,
    pub command: String,
    pub user: String,
}

pub const UNKNOWN: &str = "unknown";

/// Resolves pid, command and user for `inode`, substituting -1/"unknown" for
/// whatever cannot be found.
pub fn resolve_owner(proc_root: &Path, users: &UserResolver, inode: u64) -> SocketOwner {
    let (pid, command) = match find_process_by_inode(proc_root, inode) {
        Ok(found) => found,
        Err(e) => {
            tracing::trace!(error = %e, inode, "socket owner not found");
            return SocketOwner {
                pid: -1,
                command: UNKNOWN.into(),
                user: UNKNOWN.into(),
            };
        }
    };
    let user = read_uid(proc_root, pid)
        .and_then(|uid| users.lookup(uid))
        .unwrap_or_else(|e| {
            tracing::trace!(error = %e, pid, "socket user not resolved");
            UNKNOWN.into()
        });
    SocketOwner { pid, command, user }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uid_is_real_uid() {
        let status = "Name:\tsshd\nState:\tS (sleeping)\nUid:\t1000\t1001\t1002\t1003\n";
        assert_eq!(parse_status_uid(status), Some(1000));
        assert_eq!(parse_status_uid("Name:\tx\n"), None);
    }

    #[test]
    fn passwd_skips_comments_and_keeps_first_name() {
        let users = UserResolver::from_content(
            "# comment\nroot:x:0:0:root:/root:/bin/bash\ntoor:x:0:0::/:/bin/sh\nbad line\nalice:x:1000:1000::/home/alice:/bin/zsh\n",
        );
        assert_eq!(users.lookup(0).unwrap(), "root");
        assert_eq!(users.lookup(1000).unwrap(), "alice");
        assert!(matches!(users.lookup(42), Err(ResolveError::UserNotFound(42))));
    }
}
