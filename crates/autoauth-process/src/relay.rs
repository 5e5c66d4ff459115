//! Code relay and manual fallback prompt

use autoauth_core::Result;
use std::io::{BufRead, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::{LineRead, LoginProcess};

/// Bounds on reading the CLI's output after the code is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Stop after this long without a new line
    pub idle: Duration,
    /// Stop after this long overall
    pub total: Duration,
    /// How long to wait for the process to exit once draining stops
    pub exit_wait: Duration,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(5),
            total: Duration::from_secs(30),
            exit_wait: Duration::from_secs(5),
        }
    }
}

/// Why draining stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainEnd {
    Eof,
    Idle,
    Deadline,
}

/// Outcome of relaying a code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub lines_drained: usize,
    pub drain_end: DrainEnd,
    /// Exit code, if the process exited within the policy's wait
    pub exit_code: Option<i32>,
}

/// Send `code` to the waiting CLI, then drain and echo what it prints
pub async fn relay_code<P>(process: &mut P, code: &str, policy: DrainPolicy) -> Result<RelayReport>
where
    P: LoginProcess + ?Sized,
{
    process.write_line(code).await?;
    info!("Sent authorization code to login process");

    let deadline = Instant::now() + policy.total;
    let mut lines_drained = 0usize;

    let drain_end = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break DrainEnd::Deadline;
        }

        match process.read_line(policy.idle.min(remaining)).await? {
            LineRead::Line(line) => {
                lines_drained += 1;
                println!("{}", line);
            }
            LineRead::Eof => break DrainEnd::Eof,
            LineRead::TimedOut if remaining <= policy.idle => break DrainEnd::Deadline,
            LineRead::TimedOut => break DrainEnd::Idle,
        }
    };
    debug!("Stopped draining ({:?}) after {} line(s)", drain_end, lines_drained);

    let exit_code = process.wait_exit(policy.exit_wait).await?;
    match exit_code {
        Some(0) => info!("Login process exited successfully"),
        Some(code) => warn!("Login process exited with status {}", code),
        None => debug!("Login process still running; assuming it is done"),
    }

    Ok(RelayReport {
        lines_drained,
        drain_end,
        exit_code,
    })
}

/// Asks the operator for the code when automation could not find it
pub trait CodePrompt {
    /// Return the entered code, or `None` if input ended
    fn prompt(&mut self, message: &str) -> Result<Option<String>>;
}

/// Prompt over any reader/writer pair; blank answers ask again
pub struct ReaderPrompt<R, W> {
    reader: R,
    writer: W,
}

/// Prompt on the terminal
pub type StdinPrompt = ReaderPrompt<std::io::StdinLock<'static>, std::io::Stdout>;

impl<R: BufRead, W: Write> ReaderPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl StdinPrompt {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> CodePrompt for ReaderPrompt<R, W> {
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        loop {
            write!(self.writer, "{}", message)?;
            self.writer.flush()?;

            let mut input = String::new();
            if self.reader.read_line(&mut input)? == 0 {
                return Ok(None);
            }

            let code = input.trim();
            if !code.is_empty() {
                return Ok(Some(code.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AfterScript, MockLoginProcess};
    use std::io::Cursor;

    fn quick_policy() -> DrainPolicy {
        DrainPolicy {
            idle: Duration::from_millis(20),
            total: Duration::from_secs(1),
            exit_wait: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_relay_writes_code_and_drains() {
        let mut process = MockLoginProcess::new(Vec::<String>::new(), AfterScript::Eof)
            .with_replies(["Credentials saved", "You are now logged in"])
            .with_exit_code(0);

        let report = relay_code(&mut process, "4/abc", quick_policy()).await.unwrap();

        assert_eq!(process.written(), ["4/abc"]);
        assert_eq!(report.lines_drained, 2);
        assert_eq!(report.drain_end, DrainEnd::Eof);
        assert_eq!(report.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_relay_stops_when_process_goes_quiet() {
        let mut process = MockLoginProcess::new(Vec::<String>::new(), AfterScript::Block);

        let report = relay_code(&mut process, "ABC", quick_policy()).await.unwrap();

        assert_eq!(process.written(), ["ABC"]);
        assert_eq!(report.lines_drained, 0);
        assert_eq!(report.drain_end, DrainEnd::Idle);
        assert_eq!(report.exit_code, None);
    }

    #[test]
    fn test_prompt_skips_blank_lines() {
        let mut prompt = ReaderPrompt::new(Cursor::new("\n   \n  4/pasted \n"), Vec::new());

        let code = prompt.prompt("Paste the code here: ").unwrap();
        assert_eq!(code.as_deref(), Some("4/pasted"));

        let shown = String::from_utf8(prompt.into_writer()).unwrap();
        assert_eq!(shown.matches("Paste the code here: ").count(), 3);
    }

    #[test]
    fn test_prompt_eof() {
        let mut prompt = ReaderPrompt::new(Cursor::new(""), Vec::new());
        assert_eq!(prompt.prompt("code: ").unwrap(), None);
    }
}
