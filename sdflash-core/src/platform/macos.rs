use crate::device::DriveInfo;
use crate::error::FlashError;
use crate::platform::{Platform, dd};
use crate::request::FlashRequest;
use crate::runner::{CommandRunner, Invocation, SystemRunner};
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use plist::Value;
use serde::Deserialize;

/// The part of `diskutil list -plist` output that is needed to find drives.
///
/// Entries are kept as raw values so that a malformed one can be dropped
/// without losing the rest of the list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiskList {
    #[serde(default)]
    all_disks_and_partitions: Vec<Value>,
}

/// Looks up one entry of `AllDisksAndPartitions`.
///
/// Returns `Ok(None)` for disks that are not explicitly external.
fn disk_from_entry(entry: &Value) -> Result<Option<DriveInfo>> {
    let disk = entry
        .as_dictionary()
        .context("disk entry is not a dictionary")?;

    let internal = match disk.get("Internal") {
        None => None,
        Some(value) => Some(value.as_boolean().context("malformed Internal flag")?),
    };
    if internal != Some(false) {
        return Ok(None);
    }

    let identifier = disk
        .get("DeviceIdentifier")
        .context("missing DeviceIdentifier")?
        .as_string()
        .context("malformed DeviceIdentifier")?;

    let size = match disk.get("Size") {
        None => 0,
        Some(value) => value.as_unsigned_integer().context("malformed Size")?,
    };

    Ok(Some(DriveInfo::new(format!("/dev/{identifier}"), size)))
}

/// Extracts the external disks from a `diskutil list -plist` document.
///
/// Only disks that are explicitly marked as not internal are kept; a disk
/// without the `Internal` key is treated as internal. An entry that cannot be
/// understood is skipped, the others are still returned.
pub fn parse_disk_list(plist_bytes: &[u8]) -> Result<Vec<DriveInfo>> {
    let list: DiskList =
        plist::from_bytes(plist_bytes).context("failed to parse diskutil output")?;

    let mut drives = Vec::new();
    for (index, entry) in list.all_disks_and_partitions.iter().enumerate() {
        match disk_from_entry(entry) {
            Ok(Some(drive)) => drives.push(drive),
            Ok(None) => {}
            Err(e) => debug!("Skipping diskutil entry {index}: {e:#}"),
        }
    }

    Ok(drives)
}

/// macOS backend: drives come from `diskutil`, writes go through `sudo dd`
/// after the disk has been unmounted.
#[derive(Clone, Debug)]
pub struct MacOsPlatform<R = SystemRunner> {
    runner: R,
}

impl MacOsPlatform<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for MacOsPlatform<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> MacOsPlatform<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// The runner commands are sent to. Used by tests to inspect invocations.
    #[doc(hidden)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn query_disks(&self) -> Result<Vec<DriveInfo>> {
        let invocation = Invocation::new("diskutil").arg("list").arg("-plist");
        let output = self
            .runner
            .output(&invocation)
            .with_context(|| format!("failed to run `{invocation}`"))?;
        if !output.success {
            bail!("`{invocation}` exited with an error");
        }
        parse_disk_list(&output.stdout)
    }
}

impl<R: CommandRunner> Platform for MacOsPlatform<R> {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn list_removable_drives(&self) -> Vec<DriveInfo> {
        match self.query_disks() {
            Ok(drives) => {
                debug!("diskutil reported {} external disk(s)", drives.len());
                drives
            }
            Err(e) => {
                debug!("No drives from diskutil: {e:#}");
                Vec::new()
            }
        }
    }

    fn write_image_at(&self, request: &FlashRequest, _image: &[u8]) -> Result<(), FlashError> {
        let unmount = Invocation::new("diskutil")
            .arg("unmountDisk")
            .arg(request.device_path.display().to_string());
        match self.runner.status(&unmount) {
            Ok(true) => debug!("Unmounted {}", request.device_path.display()),
            Ok(false) => warn!("`{unmount}` failed; the disk may still be busy"),
            Err(e) => warn!("Could not run `{unmount}`: {e}"),
        }

        dd::run_dd(&self.runner, request, false)
    }
}
