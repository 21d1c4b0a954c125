#![allow(dead_code)]

use sdflash_core::FlashError;
use sdflash_core::device::DriveInfo;
use sdflash_core::platform::Platform;
use sdflash_core::request::FlashRequest;
use sdflash_core::runner::{CommandOutput, CommandRunner, Invocation};
use std::cell::RefCell;
use std::io;
use std::path::Path;

/// Builds an image of `len` bytes with the given header words.
pub fn stm32_image(magic: u32, entry: u32, size: u32, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    data[0..4].copy_from_slice(&magic.to_le_bytes());
    data[4..8].copy_from_slice(&entry.to_le_bytes());
    data[12..16].copy_from_slice(&size.to_le_bytes());
    for (i, byte) in data.iter_mut().enumerate().skip(16) {
        *byte = i as u8;
    }
    data
}

pub fn write_image(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write test image");
    path
}

/// Records every invocation instead of running it.
pub struct RecordingRunner {
    pub calls: RefCell<Vec<Invocation>>,
    pub succeed: bool,
    pub stdout: Vec<u8>,
}

impl RecordingRunner {
    pub fn succeeding() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            succeed: true,
            stdout: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::succeeding()
        }
    }

    pub fn with_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn status(&self, invocation: &Invocation) -> io::Result<bool> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(self.succeed)
    }

    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(CommandOutput {
            success: self.succeed,
            stdout: self.stdout.clone(),
        })
    }
}

/// A platform with a fixed drive list that records writes.
pub struct FakePlatform {
    pub drives: Vec<DriveInfo>,
    pub writes: RefCell<Vec<(FlashRequest, usize)>>,
    pub fail_writes: bool,
}

impl FakePlatform {
    pub fn with_drives(drives: Vec<DriveInfo>) -> Self {
        Self {
            drives,
            writes: RefCell::new(Vec::new()),
            fail_writes: false,
        }
    }

    pub fn empty() -> Self {
        Self::with_drives(Vec::new())
    }

    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }
}

impl Platform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn list_removable_drives(&self) -> Vec<DriveInfo> {
        self.drives.clone()
    }

    fn write_image_at(&self, request: &FlashRequest, image: &[u8]) -> Result<(), FlashError> {
        self.writes.borrow_mut().push((request.clone(), image.len()));
        if self.fail_writes {
            Err(FlashError::WriteFailure("device went away".to_string()))
        } else {
            Ok(())
        }
    }
}
