//! The parameters of a single flash operation.

use std::num::IntErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Default byte offset of the image on the device.
///
/// This leaves room for the partition table in front of the first-stage
/// bootloader.
pub const DEFAULT_OFFSET: u64 = 0x4400;

/// Block size used when handing the copy to `dd`.
pub const SECTOR_SIZE: u64 = 512;

/// A fully resolved request to write an image to a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashRequest {
    pub image_path: PathBuf,
    pub device_path: PathBuf,
    pub offset: u64,
}

impl FlashRequest {
    pub fn new(
        image_path: impl Into<PathBuf>,
        device_path: impl Into<PathBuf>,
        offset: u64,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            device_path: device_path.into(),
            offset,
        }
    }

    /// The offset expressed in whole [`SECTOR_SIZE`] blocks, as passed to
    /// `dd seek=`. Any remainder is dropped.
    pub fn seek_blocks(&self) -> u64 {
        self.offset / SECTOR_SIZE
    }

    pub fn is_sector_aligned(&self) -> bool {
        self.offset % SECTOR_SIZE == 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseOffsetError {
    #[error("offset is empty")]
    Empty,
    #[error("invalid digit in offset '{0}'")]
    InvalidDigit(String),
    #[error("offset '{0}' is too large")]
    Overflow(String),
}

/// Parses a byte offset written in any of the usual integer notations.
///
/// `0x`, `0o` and `0b` prefixes select hexadecimal, octal and binary; anything
/// else is decimal. An optional leading `+` is accepted. Single underscores
/// may separate digits, or follow the base prefix. A decimal number may not
/// start with `0` unless all its digits are zero.
pub fn parse_offset(input: &str) -> Result<u64, ParseOffsetError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseOffsetError::Empty);
    }
    let invalid = || ParseOffsetError::InvalidDigit(trimmed.to_string());

    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed).to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = unsigned.strip_prefix("0x") {
        (rest.strip_prefix('_').unwrap_or(rest), 16)
    } else if let Some(rest) = unsigned.strip_prefix("0o") {
        (rest.strip_prefix('_').unwrap_or(rest), 8)
    } else if let Some(rest) = unsigned.strip_prefix("0b") {
        (rest.strip_prefix('_').unwrap_or(rest), 2)
    } else {
        (unsigned.as_str(), 10)
    };

    if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(invalid());
    }
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    if radix == 10 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
        return Err(invalid());
    }

    u64::from_str_radix(&digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ParseOffsetError::Overflow(trimmed.to_string()),
        _ => invalid(),
    })
}
