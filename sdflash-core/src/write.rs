//! Contains the logic for writing an image file to a device.
//!
//! Writing is a three-step process:
//! 1.  The whole image is read into memory.
//! 2.  Its STM32 header is validated. An invalid header needs an explicit
//!     override from the user before anything is written.
//! 3.  The bytes are handed to the [`Platform`] backend, which places them on
//!     the device at the requested offset.
use crate::error::FlashError;
use crate::header;
use crate::platform::Platform;
use crate::prompt::{Prompter, say};
use crate::request::{FlashRequest, SECTOR_SIZE};
use log::{debug, info};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Writes `data` to `device` starting at byte `offset`.
///
/// The device is opened for reading and writing without truncation, so
/// everything outside `offset..offset + data.len()` is left untouched. The data
/// is flushed and synced before returning.
pub fn write_raw_at(device: &Path, offset: u64, data: &[u8]) -> io::Result<()> {
    let mut device_file = OpenOptions::new().read(true).write(true).open(device)?;

    device_file.seek(SeekFrom::Start(offset))?;
    device_file.write_all(data)?;
    device_file.flush()?;
    device_file.sync_all()?;

    Ok(())
}

/// Maps a drive-letter root such as `E:\` to its raw volume path `\\.\E:`.
///
/// Removable drives are listed by their root directory on Windows, which
/// cannot be opened for raw writes. Other paths are returned unchanged.
pub fn volume_path(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let letter = match text.as_bytes() {
        [letter, b':'] | [letter, b':', b'\\'] | [letter, b':', b'/'] => *letter,
        _ => return path.to_path_buf(),
    };

    if letter.is_ascii_alphabetic() {
        PathBuf::from(format!(r"\\.\{}:", letter.to_ascii_uppercase() as char))
    } else {
        path.to_path_buf()
    }
}

/// Pads `data` with zeros up to the next multiple of [`SECTOR_SIZE`].
///
/// Data that is already a whole number of sectors is borrowed unchanged.
pub fn pad_to_sector(data: &[u8]) -> Cow<'_, [u8]> {
    let sector = SECTOR_SIZE as usize;
    if data.len() % sector == 0 {
        return Cow::Borrowed(data);
    }

    let padded_len = data.len().div_ceil(sector) * sector;
    let mut padded = Vec::with_capacity(padded_len);
    padded.extend_from_slice(data);
    padded.resize(padded_len, 0);
    Cow::Owned(padded)
}

/// Flashes the image described by `request` through `platform`.
///
/// # Errors
///
/// This function will return an error if:
/// - The image file cannot be read.
/// - The header is invalid and the user does not override the check.
/// - The backend fails to write the device.
pub fn flash_image<P>(
    platform: &dyn Platform,
    prompter: &mut P,
    request: &FlashRequest,
) -> Result<(), FlashError>
where
    P: Prompter + ?Sized,
{
    let data = std::fs::read(&request.image_path).map_err(|e| {
        FlashError::io(
            format!("Failed to read image '{}'", request.image_path.display()),
            e,
        )
    })?;
    debug!(
        "Read {} bytes from {}",
        data.len(),
        request.image_path.display()
    );

    let check = header::check(&data);
    if let Some(parsed) = check.header() {
        debug!(
            "Header: entry {:#010x}, declared size {} of {} bytes read",
            parsed.entry_point,
            parsed.image_size,
            data.len()
        );
    }
    for line in check.to_string().lines() {
        say(prompter, line)?;
    }

    if !check.is_valid() {
        say(prompter, "")?;
        let proceed = match prompter.confirm("Invalid STM32 header. Continue anyway?") {
            Ok(answer) => answer,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                return Err(FlashError::Interrupted);
            }
            Err(e) => return Err(FlashError::io("Failed to read confirmation input", e)),
        };
        if !proceed {
            return Err(FlashError::InvalidHeader);
        }
        info!("Proceeding with an invalid header at the user's request");
    }

    say(prompter, "")?;
    say(
        prompter,
        &format!(
            "Flashing {} bytes to {} at offset 0x{:x}...",
            data.len(),
            request.device_path.display(),
            request.offset
        ),
    )?;

    info!(
        "Writing {} to {} at offset {:#x} using the {} backend",
        request.image_path.display(),
        request.device_path.display(),
        request.offset,
        platform.name()
    );
    platform.write_image_at(request, &data)?;
    info!("Write to {} finished", request.device_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_partial_sectors() {
        let data = vec![0xaa; 700];
        let padded = pad_to_sector(&data);
        assert_eq!(padded.len(), 1024);
        assert!(padded[..700].iter().all(|&b| b == 0xaa));
        assert!(padded[700..].iter().all(|&b| b == 0));

        let whole = vec![0x55; 512];
        assert!(matches!(pad_to_sector(&whole), Cow::Borrowed(_)));
        assert!(matches!(pad_to_sector(&[]), Cow::Borrowed(_)));
    }

    #[test]
    fn volume_path_maps_drive_roots() {
        assert_eq!(volume_path(Path::new(r"E:\")), PathBuf::from(r"\\.\E:"));
        assert_eq!(volume_path(Path::new("f:")), PathBuf::from(r"\\.\F:"));
        assert_eq!(volume_path(Path::new("/dev/sdb")), PathBuf::from("/dev/sdb"));
        assert_eq!(
            volume_path(Path::new(r"\\.\PhysicalDrive2")),
            PathBuf::from(r"\\.\PhysicalDrive2")
        );
        assert_eq!(volume_path(Path::new("1:")), PathBuf::from("1:"));
    }
}
