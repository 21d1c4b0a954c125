//! Provides platform-specific functionality.
//!
//! Each supported operating system gets one type implementing [`Platform`]:
//! it knows how to list the removable drives the OS exposes and how to put an
//! image on one of them. [`native`] picks the implementation for the host at
//! startup, so the rest of the library never branches on the OS itself.
//!
//! The Linux and macOS backends only shell out and read files, so they are
//! compiled everywhere and can be driven with a stub [`CommandRunner`] in
//! tests. The Windows backend calls the Win32 API and only exists there.
//!
//! [`CommandRunner`]: crate::runner::CommandRunner

use crate::device::DriveInfo;
use crate::error::FlashError;
use crate::request::FlashRequest;

mod dd;
pub mod linux;
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

pub use self::linux::LinuxPlatform;
pub use self::macos::MacOsPlatform;
#[cfg(target_os = "windows")]
pub use self::windows::WindowsPlatform;

/// The operations the flasher needs from the host operating system.
pub trait Platform {
    /// A short name for log messages.
    fn name(&self) -> &'static str;

    /// Lists the drives the OS reports as removable.
    ///
    /// A drive whose details cannot be queried is left out of the list; the
    /// failure is logged but not returned. An empty list is a valid result.
    fn list_removable_drives(&self) -> Vec<DriveInfo>;

    /// Writes `image` (the contents of `request.image_path`) to
    /// `request.device_path`, starting at `request.offset`.
    fn write_image_at(&self, request: &FlashRequest, image: &[u8]) -> Result<(), FlashError>;
}

/// Returns the backend for the operating system this binary was built for.
#[cfg(target_os = "linux")]
pub fn native() -> Result<Box<dyn Platform>, FlashError> {
    Ok(Box::new(LinuxPlatform::new()))
}

/// Returns the backend for the operating system this binary was built for.
#[cfg(target_os = "macos")]
pub fn native() -> Result<Box<dyn Platform>, FlashError> {
    Ok(Box::new(MacOsPlatform::new()))
}

/// Returns the backend for the operating system this binary was built for.
#[cfg(target_os = "windows")]
pub fn native() -> Result<Box<dyn Platform>, FlashError> {
    Ok(Box::new(WindowsPlatform::new()))
}

/// Returns the backend for the operating system this binary was built for.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn native() -> Result<Box<dyn Platform>, FlashError> {
    Err(FlashError::UnsupportedPlatform(std::env::consts::OS))
}
