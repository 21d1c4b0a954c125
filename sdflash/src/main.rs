use anyhow::Result;
use clap::{ArgAction, Parser};
use console::{Term, style};
use dialoguer::{Confirm, theme::ColorfulTheme};
use log::debug;
use sdflash_core::flow::{self, FlashArgs};
use sdflash_core::platform;
use sdflash_core::prompt::Prompter;
use sdflash_core::request::parse_offset;
use std::io::{self, BufRead, BufReader, IsTerminal, stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use libc::ECHOCTL;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use termios::{TCSANOW, Termios, tcsetattr};

#[derive(Parser)]
#[command(name = "sdflash")]
#[command(about = "Flash an STM32MP1 boot image onto an SD card", version)]
struct Cli {
    /// Path to the .stm32 image file
    image: PathBuf,

    /// Target device path (auto-detect if not specified)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Byte offset on the device, decimal or 0x-prefixed hex
    #[arg(short, long, default_value = "0x4400", value_parser = parse_offset)]
    offset: u64,

    /// Log more details to stderr (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// A helper struct that, on Unix, disables `ECHOCTL` for the terminal.
///
/// `ECHOCTL` is the terminal flag that causes Ctrl+C to be printed as `^C`.
/// With it disabled, an interrupted prompt ends with our own message only.
/// The original terminal state is restored when this struct is dropped.
struct TermRestorer {
    #[cfg(unix)]
    original_termios: Option<Termios>,
}

impl TermRestorer {
    fn new() -> Self {
        #[cfg(unix)]
        {
            if !stdout().is_terminal() {
                return Self {
                    original_termios: None,
                };
            }

            let fd = stdout().as_raw_fd();
            let original_termios = Termios::from_fd(fd).ok().filter(|original| {
                let mut new_termios = *original;
                new_termios.c_lflag &= !ECHOCTL;
                tcsetattr(fd, TCSANOW, &new_termios).is_ok()
            });

            Self { original_termios }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl Drop for TermRestorer {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(ref original_termios) = self.original_termios {
            let fd = stdout().as_raw_fd();
            tcsetattr(fd, TCSANOW, original_termios).ok();
        }
    }
}

/// Highlights the leading marker of warning and error lines.
fn styled(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("WARNING:") {
        format!("{}{rest}", style("WARNING:").red().bold())
    } else if let Some(rest) = line.strip_prefix("Warning:") {
        format!("{}{rest}", style("Warning:").yellow().bold())
    } else if let Some(rest) = line.strip_prefix("Error:") {
        format!("{}{rest}", style("Error:").red().bold())
    } else if line.starts_with("Success!") {
        style(line).green().to_string()
    } else {
        line.to_string()
    }
}

/// How often a pending read checks for Ctrl+C.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Lines from a blocking source, read on a helper thread.
///
/// The Ctrl+C handler restarts an interrupted `read(2)`, so a plain blocking
/// read of redirected stdin would only notice the interrupt after the next
/// newline. Waiting on a channel instead lets the interrupt end the wait.
struct LineReader {
    lines: Receiver<io::Result<String>>,
    interrupted: Arc<AtomicBool>,
}

impl LineReader {
    fn spawn<R>(mut source: R, interrupted: Arc<AtomicBool>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            loop {
                let mut buf = String::new();
                let line = match source.read_line(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => Ok(buf.trim_end_matches(['\r', '\n']).to_string()),
                    Err(e) => Err(e),
                };
                let failed = line.is_err();
                if sender.send(line).is_err() || failed {
                    break;
                }
            }
        });

        Self { lines, interrupted }
    }

    /// Waits for the next line, an interrupt, or the end of input.
    fn next_line(&self) -> io::Result<String> {
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "interrupted by user",
                ));
            }

            match self.lines.recv_timeout(INTERRUPT_POLL) {
                Ok(line) => return line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "end of input",
                    ));
                }
            }
        }
    }
}

/// Talks to the user on the terminal, or on plain stdin/stdout when they are
/// redirected.
struct TerminalPrompter {
    term: Term,
    interactive: bool,
    interrupted: Arc<AtomicBool>,
    /// Started on the first read when stdin or stdout is redirected.
    redirected_input: Option<LineReader>,
}

impl TerminalPrompter {
    fn new(interrupted: Arc<AtomicBool>) -> Self {
        Self {
            term: Term::stdout(),
            interactive: stdin().is_terminal() && stdout().is_terminal(),
            interrupted,
            redirected_input: None,
        }
    }

    /// Reports a Ctrl+C that arrived while waiting for input.
    fn take_interrupt(&self) -> io::Result<()> {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "interrupted by user",
            ));
        }
        Ok(())
    }
}

impl Prompter for TerminalPrompter {
    fn say(&mut self, line: &str) -> io::Result<()> {
        self.term.write_line(&styled(line))
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.term.write_str(prompt)?;
        self.term.flush()?;

        if !self.interactive {
            let interrupted = self.interrupted.clone();
            return self
                .redirected_input
                .get_or_insert_with(|| LineReader::spawn(BufReader::new(stdin()), interrupted))
                .next_line();
        }

        let line = self.term.read_line();
        self.take_interrupt()?;
        line
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        if !self.interactive {
            let answer = self.read_line(&format!("{prompt} (y/N): "))?;
            return Ok(answer.trim().eq_ignore_ascii_case("y"));
        }

        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(io::Error::other);

        self.take_interrupt()?;
        answer
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    // The handler only records the interrupt; pending prompts poll for it. A
    // `dd` child shares our process group and is stopped by the same signal.
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        debug!("Interrupt received");
    })?;

    let platform = platform::native()?;
    debug!("Using the {} backend", platform.name());

    let args = FlashArgs {
        image: cli.image,
        device: cli.device,
        offset: cli.offset,
    };

    let mut prompter = TerminalPrompter::new(interrupted);
    let result = flow::run(platform.as_ref(), &mut prompter, &args);
    Ok(flow::report(&mut prompter, &result))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // This guard will be dropped when main() exits, restoring the terminal.
    let _term_restorer = TermRestorer::new();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn offset_defaults_to_0x4400() {
        let cli = Cli::try_parse_from(["sdflash", "fsbl.stm32"]).unwrap();
        assert_eq!(cli.offset, 0x4400);
        assert_eq!(cli.device, None);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn offset_accepts_hex_and_decimal() {
        let cli = Cli::try_parse_from(["sdflash", "-o", "0x8000", "fsbl.stm32"]).unwrap();
        assert_eq!(cli.offset, 0x8000);

        let cli =
            Cli::try_parse_from(["sdflash", "--offset", "17408", "-d", "/dev/sdb", "fsbl.stm32"])
                .unwrap();
        assert_eq!(cli.offset, 17408);
        assert_eq!(cli.device, Some(PathBuf::from("/dev/sdb")));
    }

    #[test]
    fn bad_offset_is_rejected() {
        assert!(Cli::try_parse_from(["sdflash", "-o", "0xZZ", "fsbl.stm32"]).is_err());
    }

    #[test]
    fn image_is_required() {
        assert!(Cli::try_parse_from(["sdflash"]).is_err());
    }

    /// A source that never produces a line.
    struct Stalled;

    impl io::Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[test]
    fn redirected_lines_are_delivered_in_order() {
        let input = io::Cursor::new(b"1\r\nyes\n".to_vec());
        let reader = LineReader::spawn(input, Arc::new(AtomicBool::new(false)));

        assert_eq!(reader.next_line().unwrap(), "1");
        assert_eq!(reader.next_line().unwrap(), "yes");
        let err = reader.next_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn interrupt_ends_a_blocked_read() {
        let interrupted = Arc::new(AtomicBool::new(false));
        let reader = LineReader::spawn(BufReader::new(Stalled), interrupted.clone());

        let flag = interrupted.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });

        let err = reader.next_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert!(!interrupted.load(Ordering::SeqCst));
    }

    #[test]
    fn styles_only_known_markers() {
        assert_eq!(styled("Image: fsbl.stm32"), "Image: fsbl.stm32");
        assert!(styled("Error: boom").ends_with(" boom"));
    }
}
