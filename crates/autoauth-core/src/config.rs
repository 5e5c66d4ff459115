//! Configuration management for autoauth
//!
//! Settings for the login command, the account to pick, the browser and profile
//! layout, automation timeouts, the selector cache, and the manual fallback.
//! Every field has a default, so an empty or partial file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::profile::ProfileLayout;
use crate::{AutoAuthError, Result};

/// Top-level autoauth configuration
///
/// Loaded from `~/.autoauth/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoAuthConfig {
    /// Login command and its output handling
    #[serde(default)]
    pub login: LoginConfig,

    /// Account to select on the provider's account chooser
    #[serde(default)]
    pub account: AccountConfig,

    /// Browser launch and profile staging
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Click/retry loop tuning
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Selector cache location
    #[serde(default)]
    pub cache: CacheConfig,

    /// Behavior when automation cannot find the code
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// How the CLI login command is started and read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Program followed by its arguments
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Pattern locating the authorization URL in the command's output
    #[serde(default = "default_url_pattern")]
    pub url_pattern: String,

    /// Maximum wait for each output line while looking for the URL
    #[serde(default = "default_url_timeout_secs")]
    pub url_timeout_secs: u64,

    /// Stop draining output after this long without a new line
    #[serde(default = "default_drain_idle_secs")]
    pub drain_idle_secs: u64,

    /// Overall bound on draining output after the code is sent
    #[serde(default = "default_drain_total_secs")]
    pub drain_total_secs: u64,

    /// Environment overrides; the default suppresses the CLI's own browser launch
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,
}

/// Account selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Email shown on the account chooser; skipped when unset
    #[serde(default)]
    pub email: Option<String>,
}

/// Browser and profile settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Layout of the source profile to stage
    #[serde(default)]
    pub layout: ProfileLayout,

    /// Override for the directory holding browser profiles
    #[serde(default)]
    pub profiles_root: Option<PathBuf>,

    /// Override for the browser executable
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Force a dark color scheme
    #[serde(default = "default_true")]
    pub dark_mode: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Seconds the DevTools connection may stay idle
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Retry loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Maximum consent-loop iterations
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Per-selector visibility timeout when clicking consent buttons
    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,

    /// Visibility timeout for the account chooser entry
    #[serde(default = "default_account_timeout_ms")]
    pub account_timeout_ms: u64,

    /// Bound on waiting for navigation or a selector after an idle iteration
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Polling interval for visibility and navigation checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after navigation and clicks before inspecting the page
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// How many of the highest-priority selectors to wait on
    #[serde(default = "default_wait_for_top")]
    pub wait_for_top: usize,

    /// Scan visible page text for a code when the URL has none
    #[serde(default = "default_true")]
    pub scrape_page_text: bool,
}

/// Selector cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override for `~/.autoauth/selectors.json`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Manual fallback settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Open the authorization URL in the system browser before prompting
    #[serde(default)]
    pub open_url: bool,
}

// Default value providers
fn default_command() -> Vec<String> {
    ["gcloud", "auth", "login", "--no-launch-browser"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([("BROWSER".to_string(), "false".to_string())])
}

fn default_url_pattern() -> String {
    r"https://accounts\.google\.com/o/oauth2/[^\s]+".to_string()
}

fn default_url_timeout_secs() -> u64 {
    60
}

fn default_drain_idle_secs() -> u64 {
    5
}

fn default_drain_total_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    900
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> usize {
    20
}

fn default_click_timeout_ms() -> u64 {
    1000
}

fn default_account_timeout_ms() -> u64 {
    3000
}

fn default_wait_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_settle_ms() -> u64 {
    500
}

fn default_wait_for_top() -> usize {
    3
}

impl AutoAuthConfig {
    /// `~/.autoauth/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        crate::autoauth_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            AutoAuthError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write this configuration to `path`, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AutoAuthError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Where the selector cache lives, or `None` when caching is disabled
    pub fn cache_path(&self) -> Option<PathBuf> {
        if !self.cache.enabled {
            return None;
        }
        self.cache
            .path
            .clone()
            .or_else(|| crate::autoauth_dir().map(|d| d.join("selectors.json")))
    }
}

impl LoginConfig {
    pub fn url_timeout(&self) -> Duration {
        Duration::from_secs(self.url_timeout_secs)
    }

    pub fn drain_idle(&self) -> Duration {
        Duration::from_secs(self.drain_idle_secs)
    }

    pub fn drain_total(&self) -> Duration {
        Duration::from_secs(self.drain_total_secs)
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            url_pattern: default_url_pattern(),
            url_timeout_secs: default_url_timeout_secs(),
            drain_idle_secs: default_drain_idle_secs(),
            drain_total_secs: default_drain_total_secs(),
            env: default_env(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            layout: ProfileLayout::default(),
            profiles_root: None,
            executable: None,
            dark_mode: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            click_timeout_ms: default_click_timeout_ms(),
            account_timeout_ms: default_account_timeout_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            wait_for_top: default_wait_for_top(),
            scrape_page_text: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AutoAuthConfig::default();
        assert_eq!(
            config.login.command,
            vec!["gcloud", "auth", "login", "--no-launch-browser"]
        );
        assert_eq!(config.login.env.get("BROWSER").map(String::as_str), Some("false"));
        assert_eq!(config.automation.max_attempts, 20);
        assert!(config.automation.scrape_page_text);
        assert!(config.account.email.is_none());
        assert_eq!(config.browser.layout, ProfileLayout::Chromium);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AutoAuthConfig::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AutoAuthConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[account]
email = "someone@example.com"

[browser]
layout = "firefox"

[automation]
max_attempts = 5
"#,
        )
        .unwrap();

        let config = AutoAuthConfig::load_or_default(&path).unwrap();
        assert_eq!(config.account.email.as_deref(), Some("someone@example.com"));
        assert_eq!(config.browser.layout, ProfileLayout::Firefox);
        assert_eq!(config.automation.max_attempts, 5);
        assert_eq!(config.automation.click_timeout_ms, 1000);
        assert_eq!(config.login, LoginConfig::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "automation = [").unwrap();

        let err = AutoAuthConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, AutoAuthError::Config(_)));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AutoAuthConfig::default();
        config.account.email = Some("dev@example.com".to_string());
        config.write(&path).unwrap();

        assert_eq!(AutoAuthConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_cache_path_disabled() {
        let mut config = AutoAuthConfig::default();
        config.cache.path = Some(PathBuf::from("/tmp/selectors.json"));
        assert_eq!(config.cache_path(), Some(PathBuf::from("/tmp/selectors.json")));

        config.cache.enabled = false;
        assert_eq!(config.cache_path(), None);
    }
}
