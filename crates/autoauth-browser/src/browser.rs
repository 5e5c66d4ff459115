//! Browser lifecycle management using Chrome DevTools Protocol

use crate::error::{classify, AutoAuthError, Result};
use crate::locator::Locator;
use crate::page::AuthPage;
use async_trait::async_trait;
use autoauth_core::config::BrowserSettings;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: false, the operator watches the login)
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Force the dark color scheme
    pub dark_mode: bool,
    /// Profile directory the browser runs against
    pub user_data_dir: Option<PathBuf>,
    /// Browser executable (auto-detected when unset)
    pub executable: Option<PathBuf>,
    /// Navigation and element timeout in seconds
    pub timeout_seconds: u64,
    /// How long the DevTools connection may sit idle
    pub idle_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1280,
            window_height: 900,
            dark_mode: true,
            user_data_dir: None,
            executable: None,
            timeout_seconds: 30,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl BrowserConfig {
    /// Build from the `[browser]` config section for a staged profile
    pub fn from_settings(settings: &BrowserSettings, user_data_dir: PathBuf) -> Self {
        Self {
            headless: false,
            window_width: settings.window_width,
            window_height: settings.window_height,
            dark_mode: settings.dark_mode,
            user_data_dir: Some(user_data_dir),
            executable: settings.executable.clone(),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            ..Self::default()
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Active browser session with Chrome DevTools Protocol
///
/// Dropping the session shuts the browser down.
pub struct BrowserSession {
    /// Underlying browser instance (kept alive for tab lifetime)
    #[allow(dead_code)]
    browser: Browser,
    /// Current active tab
    tab: Arc<Tab>,
    /// Configuration
    config: BrowserConfig,
}

impl BrowserSession {
    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{}, profile: {:?})",
            config.headless, config.window_width, config.window_height, config.user_data_dir
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .user_data_dir(config.user_data_dir.clone())
            .path(config.executable.clone())
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .map_err(|e| AutoAuthError::Browser(format!("Failed to launch browser: {}", e)))?;

        launch_options.args.push(OsStr::new("--no-first-run"));
        launch_options.args.push(OsStr::new("--no-default-browser-check"));
        if config.dark_mode {
            launch_options.args.push(OsStr::new("--force-dark-mode"));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AutoAuthError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AutoAuthError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(config.timeout());

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Execute JavaScript in the page context
    ///
    /// # Returns
    /// JSON result from JavaScript execution
    pub async fn evaluate_script(&self, script: &str, action: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| classify(e, action, self.config.timeout()))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Close the browser session
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session");
        if let Err(e) = self.tab.close(false) {
            warn!("Tab did not close cleanly: {}", e);
        }
        // Dropping the Browser terminates the process
        Ok(())
    }
}

#[async_trait]
impl AuthPage for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| AutoAuthError::Browser(format!("Failed to navigate to {}: {}", url, e)))?;

        // Slow redirects are fine; the consent loop polls the page afterwards
        if let Err(e) = self.tab.wait_until_navigated() {
            warn!("Navigation did not settle: {}", e);
        }

        info!("Navigated to auth URL");
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        match self.evaluate_script("window.location.href", "read URL").await {
            Ok(value) => Ok(value.as_str().map(str::to_string).unwrap_or_else(|| self.tab.get_url())),
            Err(e @ AutoAuthError::Browser(_)) => Err(e),
            Err(e) => {
                // Mid-navigation evaluation failures; the target info still has the URL
                debug!("Falling back to target URL: {}", e);
                Ok(self.tab.get_url())
            }
        }
    }

    async fn page_text(&self) -> Result<String> {
        let value = self
            .evaluate_script("document.body ? document.body.innerText : ''", "read page text")
            .await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = Locator::parse(selector).visible_script();
        let value = self.evaluate_script(&script, "visibility check").await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let script = Locator::parse(selector).click_script();
        let value = self.evaluate_script(&script, "click").await?;
        let clicked = value.as_bool().unwrap_or(false);
        if clicked {
            debug!("Clicked {}", selector);
        }
        Ok(clicked)
    }
}
