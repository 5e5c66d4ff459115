//! Authorization URL capture

use autoauth_core::{AutoAuthError, Result};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info};

use crate::command::{LineRead, LoginProcess};

/// Finds the authorization URL in a line of CLI output
#[derive(Debug, Clone)]
pub struct AuthUrlMatcher {
    pattern: Regex,
}

impl AuthUrlMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| AutoAuthError::Config(format!("Invalid auth URL pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// The first match in `line`, if any
    pub fn find(&self, line: &str) -> Option<String> {
        self.pattern.find(line).map(|m| m.as_str().to_string())
    }
}

impl Default for AuthUrlMatcher {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"https://accounts\.google\.com/o/oauth2/[^\s]+")
                .expect("static regex"),
        }
    }
}

/// Read output until a line contains the authorization URL
///
/// Every line read is echoed to stdout. Reading stops at the matching line, so
/// later output stays queued for the relay. End of stream or a gap longer than
/// `line_timeout` before a match is [`AutoAuthError::AuthUrlNotFound`].
pub async fn capture_auth_url<P>(
    process: &mut P,
    matcher: &AuthUrlMatcher,
    line_timeout: Duration,
) -> Result<String>
where
    P: LoginProcess + ?Sized,
{
    let mut lines_seen = 0usize;
    loop {
        match process.read_line(line_timeout).await? {
            LineRead::Line(line) => {
                lines_seen += 1;
                println!("{}", line);
                if let Some(url) = matcher.find(&line) {
                    info!("Captured auth URL after {} line(s)", lines_seen);
                    return Ok(url);
                }
            }
            LineRead::Eof => {
                debug!("Login output closed after {} line(s)", lines_seen);
                return Err(AutoAuthError::AuthUrlNotFound(format!(
                    "login command output ended after {} line(s) without one",
                    lines_seen
                )));
            }
            LineRead::TimedOut => {
                return Err(AutoAuthError::AuthUrlNotFound(format!(
                    "no output for {:?} after {} line(s)",
                    line_timeout, lines_seen
                )));
            }
        }
    }
}
