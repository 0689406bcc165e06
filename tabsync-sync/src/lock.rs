//! Single-sync-in-flight guards.
//!
//! [`SyncSlot`] keeps two runs in one process off the same database/sheet
//! pair. [`SyncLock`] does the same across processes with a lock file under
//! `~/.tabsync/`, so a foreground `tabsync forward` cannot overlap a daemon
//! run. Both release on drop.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabsync_core::SyncConfig;

use crate::error::SyncError;
use crate::report::Direction;

pub const LOCK_FILE: &str = "sync.lock";

/// A lock older than this is taken over even if its pid looks alive.
const LOCK_STALE_HOURS: i64 = 12;

static HELD: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

// ---------------------------------------------------------------------------
// In-process slot
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SyncSlot {
    key: String,
}

impl SyncSlot {
    /// Claim the slot for the store/sheet pair `config` points at.
    pub fn acquire(config: &SyncConfig) -> Result<Self, SyncError> {
        let key = target_key(config);
        let mut held = HELD.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return Err(SyncError::Busy {
                holder: format!("another run in this process is syncing {key}"),
            });
        }
        Ok(Self { key })
    }
}

impl Drop for SyncSlot {
    fn drop(&mut self) {
        HELD.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn target_key(config: &SyncConfig) -> String {
    let notion = &config.notion;
    let sheets = &config.google_sheets;
    format!(
        "{}/{} <-> {}/{}/{}",
        notion.api_base.trim_end_matches('/'),
        notion.database_id,
        sheets.api_base.trim_end_matches('/'),
        sheets.spreadsheet_id,
        sheets.sheet_name
    )
}

// ---------------------------------------------------------------------------
// Cross-process lock file
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    direction: Direction,
    started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    /// Create `<dir>/sync.lock`, taking over a lock whose owner is gone.
    pub fn acquire(dir: &Path, direction: Direction) -> Result<Self, SyncError> {
        fs::create_dir_all(dir).map_err(lock_err(dir))?;
        let path = dir.join(LOCK_FILE);

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_json::from_str::<LockInfo>(&contents) {
                    Ok(info) if !is_stale(&info) => {
                        return Err(SyncError::Busy {
                            holder: format!(
                                "{} sync in pid {} since {}; remove {} if that process is gone",
                                info.direction,
                                info.pid,
                                info.started_at.to_rfc3339(),
                                path.display()
                            ),
                        });
                    }
                    Ok(info) => {
                        tracing::warn!("taking over stale sync lock left by pid {}", info.pid)
                    }
                    Err(_) => tracing::warn!("replacing unreadable sync lock {}", path.display()),
                }
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(lock_err(&path)(err)),
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(lock_err(&path)(err)),
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(SyncError::Busy {
                    holder: format!("{} was created by another process", path.display()),
                });
            }
            Err(err) => return Err(lock_err(&path)(err)),
        };
        let info = LockInfo {
            pid: std::process::id(),
            direction,
            started_at: Utc::now(),
        };
        let lock = Self { path };
        let body = serde_json::to_vec(&info).map_err(|err| {
            lock_err(&lock.path)(std::io::Error::new(ErrorKind::InvalidData, err))
        })?;
        file.write_all(&body).map_err(lock_err(&lock.path))?;
        tracing::debug!("acquired {}", lock.path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {err}", self.path.display());
            }
        }
    }
}

fn lock_err(path: &Path) -> impl FnOnce(std::io::Error) -> SyncError {
    let path = path.to_path_buf();
    move |source| SyncError::Lock { path, source }
}

fn is_stale(info: &LockInfo) -> bool {
    !pid_is_alive(info.pid)
        || Utc::now().signed_duration_since(info.started_at).num_hours() >= LOCK_STALE_HOURS
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}
