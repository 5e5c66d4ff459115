//! # autoauth-core
//!
//! Core types for autoauth, a tool that completes a cloud CLI's OAuth browser
//! login by driving a real browser against a staged copy of the operator's
//! browser profile.
//!
//! ## Contents
//!
//! - [`AutoAuthError`] and [`Result`] shared by every crate
//! - [`config`]: TOML configuration loaded from `~/.autoauth/config.toml`
//! - [`selectors`]: the on-disk cache of consent selectors that worked before
//! - [`extract`]: authorization code extraction from page URLs and page text
//! - [`profile`]: browser profile discovery and staging into a temp directory
//! - [`fail_open`]: helpers for operations whose failure is only a warning

mod error;

pub mod config;
pub mod extract;
pub mod fail_open;
pub mod profile;
pub mod selectors;

pub use config::AutoAuthConfig;
pub use error::{AutoAuthError, Result};
pub use extract::{CodeExtractor, CodeSource, PageTextExtractor, UrlQueryExtractor};
pub use profile::{ProfileLayout, StagedProfile};
pub use selectors::SelectorCache;

/// `~/.autoauth`, the directory holding config and the selector cache.
pub fn autoauth_dir() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|h| h.join(".autoauth"))
}
