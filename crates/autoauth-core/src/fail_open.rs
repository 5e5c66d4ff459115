//! Fail-open utilities for graceful degradation
//!
//! Some failures must never end a login run: writing the selector cache, a
//! single click that lands on a detached element, opening the fallback URL.
//! These helpers turn such errors into `None` and leave a log line behind.
//!
//! DO NOT use fail-open for:
//! - Auth URL discovery
//! - Profile discovery
//! - Writing the code to the login process

use std::future::Future;
use tracing::{debug, warn};

use crate::Result;

/// Run an infrastructure operation whose failure is only a warning
///
/// ```
/// use autoauth_core::fail_open::fail_open;
/// use autoauth_core::{AutoAuthError, Result};
///
/// fn save() -> Result<()> {
///     Err(AutoAuthError::Other("read-only home".into()))
/// }
///
/// assert_eq!(fail_open("selector cache save", save), None);
/// ```
pub fn fail_open<T, F>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (continuing): {}", operation_name, e);
            None
        }
    }
}

/// Run one automation attempt; an error counts as a failed attempt
///
/// Attempts fail routinely (stale elements, pages mid-navigation), so errors
/// are logged at debug level only.
pub async fn attempt<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            debug!("{} attempt failed: {}", operation_name, e);
            None
        }
    }
}
