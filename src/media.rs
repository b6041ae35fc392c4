//! Local media file helpers

use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// File-system operations the envelope needs for media it handles
pub trait MediaFiles: Send + Sync {
    /// Rename a freshly downloaded file so its name is unique to the sender
    /// and moment, returning the new path
    fn stamp(&self, path: &Path, sender_id: i64) -> PathBuf;

    /// Remove a file the envelope owns
    fn cleanup(&self, path: &Path);
}

/// [`MediaFiles`] backed by the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMediaFiles;

impl MediaFiles for LocalMediaFiles {
    fn stamp(&self, path: &Path, sender_id: i64) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        let stamped = path.with_file_name(safe_name(&format!("{sender_id} {now} {file_name}")));

        match std::fs::rename(path, &stamped) {
            Ok(()) => stamped,
            Err(e) => {
                warn!(
                    "Stamping file name failed for {} to {}: {}",
                    path.display(),
                    stamped.display(),
                    e
                );
                path.to_path_buf()
            }
        }
    }

    fn cleanup(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Replace characters that are awkward in file names with `-`
pub fn safe_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[-!@#$%^&*():\s]").expect("invalid regex"));
    re.replace_all(name, "-").into_owned()
}
