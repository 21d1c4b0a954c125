//! The interactive flash sequence.
//!
//! ```text
//! START ──(no device)──> SELECT_DRIVE ──> CONFIRM ──> FLASH ──> DONE | FAILED
//!   └────(device given)─────────────────────┘
//! ```
//!
//! Every failure is terminal; nothing is retried. A keyboard interrupt at the
//! drive selection counts as an invalid selection; at any later prompt it
//! aborts the run with [`FlashError::Interrupted`].
//!
//! The flow only talks to the user through a [`Prompter`] and to the OS
//! through a [`Platform`], so a front-end decides how both are provided.

use crate::device::DriveInfo;
use crate::error::FlashError;
use crate::platform::Platform;
use crate::prompt::{Prompter, say};
use crate::request::FlashRequest;
use crate::write;
use log::debug;
use std::io;
use std::path::PathBuf;

/// What the user asked for on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashArgs {
    pub image: PathBuf,
    /// Target device; when `None` the user picks from the removable drives.
    pub device: Option<PathBuf>,
    pub offset: u64,
}

/// How a run that did not fail ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Flashed,
    /// The user backed out at a prompt. Not an error.
    Cancelled,
}

enum Selection {
    Drive(DriveInfo),
    Cancel,
}

fn select_drive<P>(prompter: &mut P, drives: &[DriveInfo]) -> Result<Selection, FlashError>
where
    P: Prompter + ?Sized,
{
    say(prompter, "Available removable drives:")?;
    for (i, drive) in drives.iter().enumerate() {
        say(prompter, &format!("  {}. {drive}", i + 1))?;
    }
    say(prompter, "")?;
    say(
        prompter,
        "WARNING: Selecting the wrong drive will destroy your data!",
    )?;

    let answer = match prompter.read_line("Select drive number (0 to cancel): ") {
        Ok(answer) => answer,
        Err(e) => {
            debug!("Drive selection aborted: {e}");
            return Err(FlashError::InvalidSelection);
        }
    };

    match answer.trim().parse::<usize>() {
        Ok(0) => Ok(Selection::Cancel),
        Ok(n) if n <= drives.len() => Ok(Selection::Drive(drives[n - 1].clone())),
        _ => {
            debug!("Rejected drive selection {answer:?}");
            Err(FlashError::InvalidSelection)
        }
    }
}

/// Asks for the final go-ahead. Only the exact answer `yes` proceeds.
fn confirm_flash<P>(prompter: &mut P, request: &FlashRequest) -> Result<bool, FlashError>
where
    P: Prompter + ?Sized,
{
    say(prompter, "")?;
    say(
        prompter,
        &format!("About to flash to: {}", request.device_path.display()),
    )?;
    say(prompter, &format!("Image: {}", request.image_path.display()))?;
    say(prompter, &format!("Offset: 0x{:x}", request.offset))?;
    say(prompter, "")?;

    match prompter.read_line("Are you ABSOLUTELY SURE? Type 'yes' to continue: ") {
        Ok(answer) => Ok(answer.trim_end_matches(['\r', '\n']) == "yes"),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(FlashError::Interrupted),
        Err(e) => Err(FlashError::io("Failed to read confirmation input", e)),
    }
}

/// Runs the whole flash sequence.
///
/// # Errors
///
/// Returns an error if the image does not exist, no drive can be chosen, the
/// header check is not overridden, or the write fails. Backing out at a prompt
/// is reported as [`Outcome::Cancelled`] instead.
pub fn run<P>(
    platform: &dyn Platform,
    prompter: &mut P,
    args: &FlashArgs,
) -> Result<Outcome, FlashError>
where
    P: Prompter + ?Sized,
{
    if !args.image.exists() {
        return Err(FlashError::MissingImageFile(args.image.clone()));
    }

    say(prompter, "STM32MP1 SD Card Flasher")?;
    say(prompter, "========================")?;
    say(prompter, "")?;

    let device_path = match &args.device {
        Some(device) => device.clone(),
        None => {
            let drives = platform.list_removable_drives();
            debug!("{} backend found {} drive(s)", platform.name(), drives.len());

            if drives.is_empty() {
                say(prompter, "No removable drives found.")?;
                say(prompter, "Please specify device manually with -d option.")?;
                return Err(FlashError::NoDrivesFound);
            }

            match select_drive(prompter, &drives)? {
                Selection::Drive(drive) => drive.path,
                Selection::Cancel => {
                    say(prompter, "Cancelled.")?;
                    return Ok(Outcome::Cancelled);
                }
            }
        }
    };

    let request = FlashRequest::new(args.image.clone(), device_path, args.offset);

    if !confirm_flash(prompter, &request)? {
        say(prompter, "Cancelled.")?;
        return Ok(Outcome::Cancelled);
    }

    write::flash_image(platform, prompter, &request)?;

    say(prompter, "")?;
    say(prompter, "Success! Image flashed to SD card.")?;
    say(
        prompter,
        "You can now insert the SD card into your STM32MP1 board.",
    )?;
    Ok(Outcome::Flashed)
}

/// Process exit code for the result of [`run`].
pub fn exit_code(result: &Result<Outcome, FlashError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

/// Prints the error of a failed run, if any, and returns the exit code.
///
/// Errors whose message the flow has already shown are not repeated.
pub fn report<P>(prompter: &mut P, result: &Result<Outcome, FlashError>) -> i32
where
    P: Prompter + ?Sized,
{
    match result {
        Ok(_) | Err(FlashError::NoDrivesFound) => {}
        Err(e) => {
            let message = format!("Error: {e}");
            for line in ["", message.as_str()] {
                if let Err(err) = prompter.say(line) {
                    debug!("Could not print the error report: {err}");
                }
            }
        }
    }
    exit_code(result)
}
