//! The interaction capability used by the confirmation flow.
//!
//! The flow never touches stdin or stdout directly. A front-end supplies a
//! [`Prompter`]; tests and unattended runs use [`ScriptedPrompter`].

use crate::error::FlashError;
use std::collections::VecDeque;
use std::io;

pub trait Prompter {
    /// Prints one line of output.
    fn say(&mut self, line: &str) -> io::Result<()>;

    /// Shows `prompt` and reads one line of input, without its line terminator.
    ///
    /// A keyboard interrupt is reported as [`io::ErrorKind::Interrupted`].
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;

    /// Asks a yes/no question whose default answer is "no".
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.read_line(&format!("{prompt} (y/N): "))?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}

/// Prints a line, turning an output failure into a [`FlashError`].
pub(crate) fn say<P: Prompter + ?Sized>(prompter: &mut P, line: &str) -> Result<(), FlashError> {
    prompter
        .say(line)
        .map_err(|e| FlashError::io("Failed to write output", e))
}

/// A [`Prompter`] that answers from a fixed list of lines and records
/// everything it is asked to print.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<io::Result<String>>,
    transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(|s| Ok(s.into())).collect(),
            transcript: Vec::new(),
        }
    }

    /// Queues a keyboard interrupt as the next answer.
    pub fn then_interrupt(mut self) -> Self {
        self.answers.push_back(Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "interrupted",
        )));
        self
    }

    /// Every printed line and prompt, in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Whether any printed line or prompt contains `needle`.
    pub fn printed(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }
}

impl Prompter for ScriptedPrompter {
    fn say(&mut self, line: &str) -> io::Result<()> {
        self.transcript.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.transcript.push(prompt.to_string());
        self.answers.pop_front().unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no scripted answer left",
            ))
        })
    }
}
