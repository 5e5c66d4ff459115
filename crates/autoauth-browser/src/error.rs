//! Browser automation errors - re-exports the unified AutoAuthError from autoauth-core
//!
//! Browser failures map onto three variants:
//! - Browser(String) - the session itself is unusable (launch failed, connection closed)
//! - Automation(String) - a single page interaction failed; callers retry
//! - Timeout { .. } - a page interaction did not finish in time
//!
//! [`classify`] turns raw `headless_chrome` errors into one of these.

pub use autoauth_core::{AutoAuthError, Result};

use std::time::Duration;

pub type BrowserError = AutoAuthError;

/// Map a raw driver error for `action` onto the matching error variant
pub fn classify(e: impl std::fmt::Display, action: &str, timeout: Duration) -> AutoAuthError {
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("connection is closed") || lower.contains("channel closed") {
        AutoAuthError::Browser(format!("{} failed, browser connection lost: {}", action, s))
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AutoAuthError::Timeout {
            what: format!("{}: {}", action, s),
            timeout,
        }
    } else {
        AutoAuthError::Automation(format!("{} failed: {}", action, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let t = Duration::from_secs(1);
        assert!(matches!(
            classify("Unable to make method calls because underlying connection is closed", "eval", t),
            AutoAuthError::Browser(_)
        ));
        assert!(matches!(
            classify("The event waited for never came: Timeout", "navigate", t),
            AutoAuthError::Timeout { .. }
        ));
        assert!(matches!(
            classify("Node is detached from document", "click", t),
            AutoAuthError::Automation(_)
        ));
    }
}
