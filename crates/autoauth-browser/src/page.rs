//! Page capability interface
//!
//! The consent driver only needs a handful of page operations. Keeping them
//! behind [`AuthPage`] lets tests drive it with a scripted page instead of a
//! real browser.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::error::Result;

/// Interval between visibility checks while waiting to click
pub const CLICK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
pub trait AuthPage: Send + Sync {
    /// Load `url` and wait for the navigation to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL of the current page
    ///
    /// An [`AutoAuthError::Browser`](crate::AutoAuthError::Browser) error means
    /// the session is gone; other errors are transient.
    async fn current_url(&self) -> Result<String>;

    /// Visible text of the page body
    async fn page_text(&self) -> Result<String>;

    /// Whether `selector` currently matches a visible element
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Click the first visible match of `selector` now; `false` if there is none
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Wait up to `timeout` for `selector` to become visible, then click it
    ///
    /// Returns `Ok(false)` when the timeout passes; that is not an error.
    async fn click_if_visible(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return self.click(selector).await;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            sleep(CLICK_POLL_INTERVAL.min(remaining)).await;
        }
    }
}
