//! Parsing and validation of the STM32 image header.
//!
//! Boot images for the STM32MP1 start with a small preamble of four
//! little-endian 32-bit words: a magic number, the entry point address, a
//! reserved word and the declared payload size. Only the magic number is
//! checked. The check is advisory: the image writer lets the user override it.

use std::fmt;

/// Number of bytes actually decoded from the start of the image.
pub const HEADER_LEN: usize = 16;

/// Images shorter than this are rejected before the header is decoded.
///
/// This is larger than [`HEADER_LEN`]; the whole 256-byte header region has to
/// be present even though only the first 16 bytes are interpreted.
pub const MIN_IMAGE_LEN: usize = 256;

/// The only accepted value of [`ImageHeader::magic`].
pub const HEADER_MAGIC: u32 = 1;

/// The fixed preamble at the start of an STM32 boot image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub entry_point: u32,
    pub reserved: u32,
    pub image_size: u32,
}

impl ImageHeader {
    /// Decodes the four header words, or `None` if `data` is shorter than
    /// [`HEADER_LEN`]. No validation is performed.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = data.get(..HEADER_LEN)?;
        let word = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&header[i * 4..i * 4 + 4]);
            u32::from_le_bytes(bytes)
        };

        Some(Self {
            magic: word(0),
            entry_point: word(1),
            reserved: word(2),
            image_size: word(3),
        })
    }
}

/// The result of validating an image buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderCheck {
    /// The buffer is shorter than [`MIN_IMAGE_LEN`].
    TooShort { len: usize },
    /// The header was decoded but its magic number is not [`HEADER_MAGIC`].
    BadMagic { magic: u32 },
    Valid(ImageHeader),
}

impl HeaderCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, HeaderCheck::Valid(_))
    }

    pub fn header(&self) -> Option<&ImageHeader> {
        match self {
            HeaderCheck::Valid(header) => Some(header),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderCheck::TooShort { len } => write!(
                f,
                "Warning: Image is too small for an STM32 header ({len} bytes, need at least {MIN_IMAGE_LEN})"
            ),
            HeaderCheck::BadMagic { magic } => {
                write!(f, "Warning: Invalid magic number: 0x{magic:08x}")
            }
            HeaderCheck::Valid(header) => {
                writeln!(f, "STM32 Header found:")?;
                writeln!(f, "  Magic: 0x{:08x}", header.magic)?;
                writeln!(f, "  Entry: 0x{:08x}", header.entry_point)?;
                write!(f, "  Size:  {} bytes", header.image_size)
            }
        }
    }
}

/// Validates the header at the start of `data`.
///
/// Never panics, whatever the length of `data`.
pub fn check(data: &[u8]) -> HeaderCheck {
    if data.len() < MIN_IMAGE_LEN {
        return HeaderCheck::TooShort { len: data.len() };
    }

    match ImageHeader::parse(data) {
        Some(header) if header.magic == HEADER_MAGIC => HeaderCheck::Valid(header),
        Some(header) => HeaderCheck::BadMagic {
            magic: header.magic,
        },
        // Unreachable in practice since MIN_IMAGE_LEN > HEADER_LEN.
        None => HeaderCheck::TooShort { len: data.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(magic: u32, entry: u32, size: u32, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0..4].copy_from_slice(&magic.to_le_bytes());
        data[4..8].copy_from_slice(&entry.to_le_bytes());
        data[8..12].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        data[12..16].copy_from_slice(&size.to_le_bytes());
        data
    }

    #[test]
    fn short_buffers_are_invalid() {
        for len in [0, 1, 15, 16, 255] {
            let data = vec![0x01; len];
            assert_eq!(check(&data), HeaderCheck::TooShort { len });
            assert!(!check(&data).is_valid());
        }
    }

    #[test]
    fn magic_one_is_valid() {
        let data = image(1, 0x1000, 256, 256);
        let result = check(&data);
        assert!(result.is_valid());

        let header = result.header().unwrap();
        assert_eq!(header.entry_point, 0x1000);
        assert_eq!(header.reserved, 0xdead_beef);
        assert_eq!(header.image_size, 256);
    }

    #[test]
    fn other_magic_is_invalid() {
        let data = image(0x324d_5453, 0x1000, 256, 512);
        let result = check(&data);
        assert_eq!(result, HeaderCheck::BadMagic { magic: 0x324d_5453 });
        assert_eq!(
            result.to_string(),
            "Warning: Invalid magic number: 0x324d5453"
        );
    }

    #[test]
    fn fields_are_little_endian() {
        let mut data = vec![0u8; 16];
        data[0] = 0x01;
        data[4..8].copy_from_slice(&[0x00, 0x00, 0x01, 0xc0]);
        let header = ImageHeader::parse(&data).unwrap();
        assert_eq!(header.magic, 1);
        assert_eq!(header.entry_point, 0xc001_0000);
        assert!(ImageHeader::parse(&data[..15]).is_none());
    }

    #[test]
    fn valid_report_lists_fields() {
        let data = image(1, 0x2ffe_0000, 4096, 256);
        let report = check(&data).to_string();
        assert!(report.starts_with("STM32 Header found:"));
        assert!(report.contains("  Magic: 0x00000001"));
        assert!(report.contains("  Entry: 0x2ffe0000"));
        assert!(report.contains("  Size:  4096 bytes"));
    }
}
