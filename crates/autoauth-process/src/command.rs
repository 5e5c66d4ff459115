//! Login subprocess abstraction
//!
//! The workflow only needs three things from the CLI it is logging in: read a
//! line of (merged stdout/stderr) output with a timeout, write one line to its
//! stdin, and wait a bounded time for it to exit. [`LoginProcess`] captures
//! exactly that so tests can substitute [`MockLoginProcess`].

use async_trait::async_trait;
use autoauth_core::{AutoAuthError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, instrument, warn};

/// Result of waiting for one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// Both output streams are closed
    Eof,
    /// No line arrived within the timeout
    TimedOut,
}

/// Capability interface over the CLI being logged in
#[async_trait]
pub trait LoginProcess: Send {
    /// Wait up to `timeout` for the next line of output
    async fn read_line(&mut self, timeout: Duration) -> Result<LineRead>;

    /// Write `line` plus a newline to stdin and flush
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Wait up to `timeout` for the process to exit; `None` if it is still running
    async fn wait_exit(&mut self, timeout: Duration) -> Result<Option<i32>>;
}

/// Program, arguments and environment overrides for the login CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LoginCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build from a `[program, args...]` vector
    pub fn from_argv(argv: &[String], env: &BTreeMap<String, String>) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AutoAuthError::Config("Login command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: env.clone(),
        })
    }

    /// Human-readable command line for log output
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Real login process spawned with tokio
///
/// stdout and stderr are read line-by-line by two reader tasks feeding one
/// channel, so callers see a single merged stream.
#[derive(Debug)]
pub struct CliLoginProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
}

impl CliLoginProcess {
    #[instrument(skip(command), fields(command = %command.display()))]
    pub fn spawn(command: &LoginCommand) -> Result<Self> {
        debug!("Spawning login command");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AutoAuthError::Process(format!("Failed to start {}: {}", command.program, e))
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AutoAuthError::Process("Missing stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AutoAuthError::Process("Missing stderr pipe".to_string()))?;

        let (tx, lines) = mpsc::unbounded_channel();
        spawn_line_reader(stdout, tx.clone());
        spawn_line_reader(stderr, tx);

        Ok(Self {
            child,
            stdin,
            lines,
        })
    }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading login output: {}", e);
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl LoginProcess for CliLoginProcess {
    async fn read_line(&mut self, timeout: Duration) -> Result<LineRead> {
        match time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => Ok(LineRead::Line(line)),
            Ok(None) => Ok(LineRead::Eof),
            Err(_elapsed) => Ok(LineRead::TimedOut),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AutoAuthError::Process("stdin is closed".to_string()))?;

        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| AutoAuthError::Process(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| AutoAuthError::Process(format!("Failed to flush stdin: {}", e)))?;
        Ok(())
    }

    async fn wait_exit(&mut self, timeout: Duration) -> Result<Option<i32>> {
        // Closing stdin lets CLIs that read until EOF finish
        self.stdin.take();

        match time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Ok(Some(status.code().unwrap_or(-1))),
            Ok(Err(e)) => Err(AutoAuthError::Process(format!(
                "Failed to wait for login process: {}",
                e
            ))),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// What a [`MockLoginProcess`] does once its scripted lines run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// Report end of stream
    Eof,
    /// Behave like a process waiting on stdin: every read times out
    Block,
}

/// Scripted login process for tests
#[derive(Debug, Clone)]
pub struct MockLoginProcess {
    lines: VecDeque<String>,
    after_script: AfterScript,
    /// Lines emitted once something has been written to stdin
    replies: VecDeque<String>,
    written: Vec<String>,
    reads: usize,
    exit_code: Option<i32>,
}

impl MockLoginProcess {
    pub fn new<I, S>(lines: I, after_script: AfterScript) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            after_script,
            replies: VecDeque::new(),
            written: Vec::new(),
            reads: 0,
            exit_code: None,
        }
    }

    /// Lines to emit after the first stdin write
    pub fn with_replies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies = replies.into_iter().map(Into::into).collect();
        self
    }

    /// Exit code reported by [`LoginProcess::wait_exit`]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Everything written to stdin, one entry per line
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Number of lines handed out so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl LoginProcess for MockLoginProcess {
    async fn read_line(&mut self, _timeout: Duration) -> Result<LineRead> {
        let next = if self.written.is_empty() {
            self.lines.pop_front()
        } else {
            self.replies.pop_front()
        };

        match next {
            Some(line) => {
                self.reads += 1;
                Ok(LineRead::Line(line))
            }
            None => Ok(match self.after_script {
                AfterScript::Eof => LineRead::Eof,
                AfterScript::Block => LineRead::TimedOut,
            }),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.written.push(line.to_string());
        Ok(())
    }

    async fn wait_exit(&mut self, _timeout: Duration) -> Result<Option<i32>> {
        Ok(self.exit_code)
    }
}
