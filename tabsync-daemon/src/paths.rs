use std::path::{Path, PathBuf};

use tabsync_core::config::tabsync_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    tabsync_root(home).join(DAEMON_SOCKET)
}
