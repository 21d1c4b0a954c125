use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a flash run.
///
/// A user declining at a confirmation prompt is not an error; see
/// [`crate::flow::Outcome::Cancelled`].
#[derive(Debug, Error)]
pub enum FlashError {
    #[error("Image file '{}' not found", .0.display())]
    MissingImageFile(PathBuf),

    #[error("No removable drives found.")]
    NoDrivesFound,

    #[error("Invalid selection or cancelled.")]
    InvalidSelection,

    #[error("Interrupted.")]
    Interrupted,

    #[error("Invalid STM32 header, write declined.")]
    InvalidHeader,

    #[error("Failed to flash image: {0}")]
    WriteFailure(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(&'static str),
}

impl FlashError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        FlashError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
