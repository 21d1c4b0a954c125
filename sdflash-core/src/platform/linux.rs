use crate::device::DriveInfo;
use crate::error::FlashError;
use crate::platform::{Platform, dd};
use crate::request::{FlashRequest, SECTOR_SIZE};
use crate::runner::{CommandRunner, SystemRunner};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SYS_BLOCK: &str = "/sys/block";

/// Linux backend: drives come from sysfs, writes go through `sudo dd`.
#[derive(Clone, Debug)]
pub struct LinuxPlatform<R = SystemRunner> {
    sys_block: PathBuf,
    runner: R,
}

impl LinuxPlatform<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SYS_BLOCK, SystemRunner)
    }
}

impl Default for LinuxPlatform<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> LinuxPlatform<R> {
    /// Creates a backend that scans `sys_block` instead of `/sys/block` and
    /// runs commands through `runner`.
    pub fn with_runner(sys_block: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            sys_block: sys_block.into(),
            runner,
        }
    }

    /// The runner commands are sent to. Used by tests to inspect invocations.
    #[doc(hidden)]
    pub fn runner(&self) -> &R {
        &self.runner
    }
}

/// Helper to read a specific file from a device's sysfs directory.
fn read_sys_file(sys_block: &Path, device_name: &str, file: &str) -> io::Result<String> {
    let path = sys_block.join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Looks up one entry of the block directory.
///
/// Returns `Ok(None)` for devices that are not removable.
fn read_device(sys_block: &Path, device_name: &str) -> Result<Option<DriveInfo>> {
    let removable = read_sys_file(sys_block, device_name, "removable")
        .context("failed to read the removable flag")?;
    if removable != "1" {
        return Ok(None);
    }

    let sectors: u64 = read_sys_file(sys_block, device_name, "size")
        .context("failed to read the sector count")?
        .parse()
        .context("malformed sector count")?;

    Ok(Some(DriveInfo::new(
        Path::new("/dev").join(device_name),
        sectors.saturating_mul(SECTOR_SIZE),
    )))
}

impl<R: CommandRunner> Platform for LinuxPlatform<R> {
    fn name(&self) -> &'static str {
        "linux"
    }

    /// Scans the block directory for devices whose `removable` flag is `1`.
    ///
    /// The size of each device is its `size` attribute (in 512-byte sectors)
    /// converted to bytes. Devices are returned sorted by name.
    fn list_removable_drives(&self) -> Vec<DriveInfo> {
        let block_dir = match fs::read_dir(&self.sys_block) {
            Ok(dir) => dir,
            Err(e) => {
                debug!("Cannot read {}: {e}", self.sys_block.display());
                return Vec::new();
            }
        };

        let mut names: Vec<String> = block_dir
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let mut drives = Vec::new();
        for name in names {
            match read_device(&self.sys_block, &name) {
                Ok(Some(drive)) => {
                    debug!("Found removable drive {drive}");
                    drives.push(drive);
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping {name}: {e:#}"),
            }
        }

        drives
    }

    fn write_image_at(&self, request: &FlashRequest, _image: &[u8]) -> Result<(), FlashError> {
        dd::run_dd(&self.runner, request, true)
    }
}
