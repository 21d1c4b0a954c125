use std::fmt;
use std::path::PathBuf;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A removable drive discovered on the system.
///
/// Values are produced fresh by [`crate::platform::Platform::list_removable_drives`]
/// on every run and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveInfo {
    /// The system path to the drive (e.g., `/dev/sdb`, `/dev/disk4` or `E:\`).
    pub path: PathBuf,
    /// The total capacity of the drive in bytes.
    pub size_bytes: u64,
}

impl DriveInfo {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// The capacity in GiB, as shown in the selection list.
    pub fn size_gib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_GIB
    }
}

impl fmt::Display for DriveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1} GB)", self.path.display(), self.size_gib())
    }
}
