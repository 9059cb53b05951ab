//! Monitor directory selection.

use std::path::{Path, PathBuf};

/// RAM-backed shared memory directory on Linux.
pub const DEV_SHM_DIRECTORY: &str = "/dev/shm";

/// Subdirectory holding monitor files.
pub const MONITOR_DIR_NAME: &str = "gwmon";

/// Directory where monitor files are created by default.
///
/// Prefers `/dev/shm/gwmon` on Linux so the file never touches a disk,
/// otherwise falls back to `gwmon` under the system temp directory. The only
/// side effect is an existence check of `/dev/shm`.
pub fn resolve_directory() -> PathBuf {
    let shm = Path::new(DEV_SHM_DIRECTORY);
    let shm_available = cfg!(target_os = "linux") && shm.is_dir();
    select_directory(shm_available.then_some(shm), &std::env::temp_dir())
}

fn select_directory(shm: Option<&Path>, temp: &Path) -> PathBuf {
    shm.unwrap_or(temp).join(MONITOR_DIR_NAME)
}
