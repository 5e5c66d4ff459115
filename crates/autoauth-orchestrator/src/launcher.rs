//! Browser launching behind a trait so the workflow can run against fakes

use async_trait::async_trait;
use autoauth_browser::{AuthPage, BrowserConfig, BrowserSession};
use autoauth_core::config::BrowserSettings;
use autoauth_core::Result;
use std::path::Path;

/// Starts a browser running against a staged profile
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Page: AuthPage;

    /// Launch a browser using `profile_dir` as its profile
    ///
    /// Dropping the returned page shuts the browser down.
    async fn launch(&self, profile_dir: &Path) -> Result<Self::Page>;
}

/// Launches Chromium through the DevTools protocol
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Page = BrowserSession;

    async fn launch(&self, profile_dir: &Path) -> Result<BrowserSession> {
        let config = BrowserConfig::from_settings(&self.settings, profile_dir.to_path_buf());
        BrowserSession::launch_with_config(config).await
    }
}
