//! The core, UI-agnostic library for the `sdflash` utility.
//!
//! `sdflash-core` puts STM32MP1 boot images on SD cards. It can be driven by
//! any front-end: the interactive parts only need something that implements
//! [`prompt::Prompter`], and everything OS-specific sits behind
//! [`platform::Platform`].
//!
//! The library is structured into several key modules:
//! - [`device`]: The `DriveInfo` struct describing a removable drive.
//! - [`header`]: Parsing and validation of the 16-byte STM32 image header.
//! - [`request`]: The `FlashRequest` handed to the writer and offset parsing.
//! - [`platform`]: Per-OS drive discovery and raw writing.
//! - [`runner`]: The seam through which external programs are run.
//! - [`mod@write`]: The image writer: read, validate, confirm, write.
//! - [`flow`]: The interactive select / confirm / flash sequence.
//!
//! ## Example: Flashing a Known Device Without Prompts
//!
//! ```rust,no_run
//! use sdflash_core::flow::{self, FlashArgs, Outcome};
//! use sdflash_core::platform;
//! use sdflash_core::prompt::ScriptedPrompter;
//! use sdflash_core::request::DEFAULT_OFFSET;
//!
//! fn main() -> anyhow::Result<()> {
//!     let platform = platform::native()?;
//!
//!     // Answer the final confirmation up front.
//!     let mut prompter = ScriptedPrompter::new(["yes"]);
//!
//!     let args = FlashArgs {
//!         image: "tf-a-stm32mp135f-dk-sdcard.stm32".into(),
//!         device: Some("/dev/sdb".into()),
//!         offset: DEFAULT_OFFSET,
//!     };
//!
//!     let outcome = flow::run(platform.as_ref(), &mut prompter, &args)?;
//!     assert_eq!(outcome, Outcome::Flashed);
//!
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod flow;
pub mod header;
pub mod platform;
pub mod prompt;
pub mod request;
pub mod runner;
pub mod write;

pub use error::FlashError;
