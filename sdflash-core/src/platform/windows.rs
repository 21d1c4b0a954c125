use crate::device::DriveInfo;
use crate::error::FlashError;
use crate::platform::Platform;
use crate::request::FlashRequest;
use crate::write::{pad_to_sector, volume_path, write_raw_at};
use log::debug;
use std::iter;
use std::ptr;
use windows_sys::Win32::Storage::FileSystem::{
    GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDrives,
};

/// `GetDriveTypeW` result for drives with removable media.
const DRIVE_REMOVABLE: u32 = 2;

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(iter::once(0)).collect()
}

/// Windows backend: drives come from the volume API, writes go straight to
/// the raw volume.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    /// Checks the 26 drive letters for removable drives.
    ///
    /// The size reported is the total capacity of the mounted volume. A drive
    /// whose capacity cannot be queried (e.g. an empty card reader) is skipped.
    fn list_removable_drives(&self) -> Vec<DriveInfo> {
        // SAFETY: takes no arguments and only returns a bitmask.
        let drive_bits = unsafe { GetLogicalDrives() };
        let mut drives = Vec::new();

        for (index, letter) in (b'A'..=b'Z').enumerate() {
            if drive_bits & (1 << index) == 0 {
                continue;
            }

            let root = format!("{}:\\", letter as char);
            let wide_root = to_wide(&root);

            // SAFETY: `wide_root` is a NUL-terminated UTF-16 string that
            // outlives the call.
            let drive_type = unsafe { GetDriveTypeW(wide_root.as_ptr()) };
            if drive_type != DRIVE_REMOVABLE {
                continue;
            }

            let mut total_bytes: u64 = 0;
            // SAFETY: as above; the out-pointer is valid for the duration of
            // the call and the unused outputs are allowed to be null.
            let ok = unsafe {
                GetDiskFreeSpaceExW(
                    wide_root.as_ptr(),
                    ptr::null_mut(),
                    &mut total_bytes,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                debug!("Skipping {root}: cannot query its capacity");
                continue;
            }

            drives.push(DriveInfo::new(root, total_bytes));
        }

        drives
    }

    fn write_image_at(&self, request: &FlashRequest, image: &[u8]) -> Result<(), FlashError> {
        let target = volume_path(&request.device_path);
        debug!("Opening {} for a raw write", target.display());

        // Raw volume handles only accept whole sectors.
        let data = if target != request.device_path {
            pad_to_sector(image)
        } else {
            image.into()
        };

        write_raw_at(&target, request.offset, &data).map_err(|e| {
            FlashError::WriteFailure(format!("writing to {}: {e}", target.display()))
        })
    }
}
