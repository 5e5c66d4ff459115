//! Browser automation for the OAuth consent flow
//!
//! Drives a Chromium browser over the Chrome DevTools Protocol through the
//! account chooser and consent screens until an authorization code appears.
//!
//! # Example
//!
//! ```no_run
//! use autoauth_browser::{BrowserConfig, BrowserSession, ConsentDriver, DriverSettings};
//! use autoauth_core::SelectorCache;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrowserConfig {
//!         user_data_dir: Some(PathBuf::from("/tmp/autoauth_profile")),
//!         ..BrowserConfig::default()
//!     };
//!     let session = BrowserSession::launch_with_config(config).await?;
//!
//!     let driver = ConsentDriver::new(DriverSettings::default());
//!     let outcome = driver
//!         .drive(&session, "https://accounts.google.com/o/oauth2/auth?...", SelectorCache::default())
//!         .await;
//!
//!     println!("code: {:?}", outcome.code);
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - Chrome or Chromium installed (or `browser.executable` configured)
//!
//! # Architecture
//!
//! - [`browser`]: Browser lifecycle and the CDP-backed [`AuthPage`]
//! - [`driver`]: The consent loop
//! - [`locator`]: Selector strings to in-page lookups
//! - [`page`]: The page capability the driver works against
//! - [`error`]: Driver error classification

pub mod browser;
pub mod driver;
pub mod error;
pub mod locator;
pub mod page;

// Re-export commonly used types
pub use browser::{BrowserConfig, BrowserSession};
pub use driver::{ConsentDriver, DriveOutcome, DriverSettings, StopReason};
pub use error::{classify, AutoAuthError, BrowserError, Result};
pub use locator::Locator;
pub use page::AuthPage;
