//! The `dd` invocation shared by the Unix backends.

use crate::error::FlashError;
use crate::request::{FlashRequest, SECTOR_SIZE};
use crate::runner::{CommandRunner, Invocation};
use log::warn;

/// Builds the privileged `dd` command that copies the image onto the device.
pub(crate) fn dd_invocation(request: &FlashRequest, show_progress: bool) -> Invocation {
    let invocation = Invocation::new("sudo")
        .arg("dd")
        .arg(format!("if={}", request.image_path.display()))
        .arg(format!("of={}", request.device_path.display()))
        .arg(format!("bs={SECTOR_SIZE}"))
        .arg(format!("seek={}", request.seek_blocks()))
        .arg("conv=fsync");

    if show_progress {
        invocation.arg("status=progress")
    } else {
        invocation
    }
}

/// Runs `dd` and maps its exit status to the writer's result.
pub(crate) fn run_dd<R: CommandRunner>(
    runner: &R,
    request: &FlashRequest,
    show_progress: bool,
) -> Result<(), FlashError> {
    if !request.is_sector_aligned() {
        warn!(
            "Offset {:#x} is not a multiple of {SECTOR_SIZE}; dd will seek to {:#x} instead",
            request.offset,
            request.seek_blocks() * SECTOR_SIZE
        );
    }

    let invocation = dd_invocation(request, show_progress);
    match runner.status(&invocation) {
        Ok(true) => Ok(()),
        Ok(false) => Err(FlashError::WriteFailure(format!(
            "`{invocation}` exited with an error"
        ))),
        Err(e) => Err(FlashError::WriteFailure(format!(
            "could not run `{}`: {e}",
            invocation.program
        ))),
    }
}
