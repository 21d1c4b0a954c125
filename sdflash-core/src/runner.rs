//! Running external programs.
//!
//! The Unix backends hand the actual copy to `dd` and query drives through
//! `diskutil`. Those calls go through [`CommandRunner`] so the backends can be
//! exercised with a stub that records invocations instead of running them.

use log::debug;
use std::fmt;
use std::io;
use std::process::{Command, Stdio};

/// A program and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Returns the value of the first `key=value` argument with the given key.
    #[doc(hidden)]
    pub fn operand(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            arg.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of [`CommandRunner::output`].
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
}

pub trait CommandRunner {
    /// Runs the program attached to the current terminal and reports whether
    /// it exited successfully.
    fn status(&self, invocation: &Invocation) -> io::Result<bool>;

    /// Runs the program with its standard output captured.
    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs programs for real with [`std::process::Command`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn status(&self, invocation: &Invocation) -> io::Result<bool> {
        debug!("Running `{invocation}`");
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()?;
        debug!("`{}` exited with {status}", invocation.program);
        Ok(status.success())
    }

    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        debug!("Running `{invocation}` (captured)");
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
        })
    }
}
