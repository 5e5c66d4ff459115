//! Login workflow - one automated CLI login from start to finish
//!
//! Steps:
//! 1. Capture the authorization URL from the CLI's output (fatal on failure)
//! 2. Resolve the operator's default browser profile (fatal on failure)
//! 3. Stage a copy of its cookie files and launch a browser on it
//! 4. Drive the consent screens until a code appears
//! 5. Shut the browser down and remove the staged profile
//! 6. Persist selector successes, fall back to a manual prompt if needed
//! 7. Relay the code to the CLI and drain its remaining output
//!
//! Everything between steps 3 and 6 is best effort: a browser that fails to
//! launch or dies midway sends the run to the manual prompt.

use autoauth_browser::{ConsentDriver, DriverSettings, StopReason};
use autoauth_core::config::AutoAuthConfig;
use autoauth_core::fail_open::fail_open;
use autoauth_core::profile::{resolve_default_profile, ProfileLayout, StagedProfile};
use autoauth_core::{AutoAuthError, Result, SelectorCache};
use autoauth_process::{
    capture_auth_url, relay_code, AuthUrlMatcher, CodePrompt, DrainPolicy, LoginProcess,
    RelayReport,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::launcher::BrowserLauncher;

const MANUAL_PROMPT: &str = "Enter authorization code: ";

/// Everything a login run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct LoginContext {
    pub matcher: AuthUrlMatcher,
    /// Maximum wait for each CLI output line before the URL shows up
    pub url_timeout: Duration,
    pub layout: ProfileLayout,
    /// Directory holding browser profiles; the layout's platform default when unset
    pub profiles_root: Option<PathBuf>,
    /// Selector cache file; `None` disables the cache
    pub cache_path: Option<PathBuf>,
    pub driver: DriverSettings,
    pub drain: DrainPolicy,
    /// Open the URL in the system browser before prompting by hand
    pub open_fallback: bool,
}

impl LoginContext {
    pub fn from_config(config: &AutoAuthConfig) -> Result<Self> {
        Ok(Self {
            matcher: AuthUrlMatcher::new(&config.login.url_pattern)?,
            url_timeout: config.login.url_timeout(),
            layout: config.browser.layout,
            profiles_root: config.browser.profiles_root.clone(),
            cache_path: config.cache_path(),
            driver: DriverSettings::from_config(&config.automation, &config.account),
            drain: DrainPolicy {
                idle: config.login.drain_idle(),
                total: config.login.drain_total(),
                ..DrainPolicy::default()
            },
            open_fallback: config.fallback.open_url,
        })
    }

    fn profiles_root(&self) -> Result<PathBuf> {
        self.profiles_root
            .clone()
            .or_else(|| self.layout.default_profiles_root())
            .ok_or_else(|| AutoAuthError::ProfileNotFound {
                root: PathBuf::new(),
                reason: format!("no default {} profiles directory on this platform", self.layout),
            })
    }
}

/// Where the relayed code came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOrigin {
    Automated,
    Manual,
}

/// Summary of a completed login run
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub auth_url: String,
    pub profile: PathBuf,
    pub origin: CodeOrigin,
    /// Consent loop iterations used; zero when the browser never started
    pub attempts: usize,
    /// Why the consent loop stopped; `None` when the browser never started
    pub stop: Option<StopReason>,
    pub cache_saved: bool,
    pub relay: RelayReport,
}

/// What the browser phase produced
struct Automation {
    code: Option<String>,
    attempts: usize,
    stop: Option<StopReason>,
    cache_saved: bool,
}

/// Runs the login workflow
pub struct LoginWorkflow {
    context: LoginContext,
    driver: ConsentDriver,
}

impl LoginWorkflow {
    pub fn new(context: LoginContext) -> Self {
        let driver = ConsentDriver::new(context.driver.clone());
        Self { context, driver }
    }

    pub fn context(&self) -> &LoginContext {
        &self.context
    }

    /// Run one login against `process`
    ///
    /// Returns an error when no URL or no profile is found (the browser is
    /// never launched then), when writing to the process fails, or when no
    /// code was found and the operator entered none.
    pub async fn run<P, L, C>(
        &self,
        process: &mut P,
        launcher: &L,
        prompt: &mut C,
    ) -> Result<LoginReport>
    where
        P: LoginProcess + ?Sized,
        L: BrowserLauncher,
        C: CodePrompt + ?Sized,
    {
        let auth_url =
            capture_auth_url(process, &self.context.matcher, self.context.url_timeout).await?;

        let root = self.context.profiles_root()?;
        let profile = resolve_default_profile(&root, self.context.layout)?;
        info!("Using {} profile {}", self.context.layout, profile.display());

        let automation = self.automate(&auth_url, &profile, launcher).await;

        let (code, origin) = match automation.code {
            Some(code) => (code, CodeOrigin::Automated),
            None => (self.manual_code(&auth_url, prompt)?, CodeOrigin::Manual),
        };

        let relay = relay_code(process, &code, self.context.drain).await?;
        info!("Login finished ({:?} code)", origin);

        Ok(LoginReport {
            auth_url,
            profile,
            origin,
            attempts: automation.attempts,
            stop: automation.stop,
            cache_saved: automation.cache_saved,
            relay,
        })
    }

    /// Browser phase; never fails, the staged profile is gone when it returns
    async fn automate<L>(&self, auth_url: &str, profile: &Path, launcher: &L) -> Automation
    where
        L: BrowserLauncher,
    {
        let mut automation = Automation {
            code: None,
            attempts: 0,
            stop: None,
            cache_saved: false,
        };

        let staged = match StagedProfile::stage(profile, self.context.layout) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Could not stage profile, skipping automation: {}", e);
                return automation;
            }
        };

        let cache = match &self.context.cache_path {
            Some(path) => SelectorCache::load(path),
            None => SelectorCache::default(),
        };

        match launcher.launch(staged.path()).await {
            Ok(page) => {
                let outcome = self.driver.drive(&page, auth_url, cache).await;
                drop(page);

                automation.code = outcome.code;
                automation.attempts = outcome.attempts;
                automation.stop = Some(outcome.stop);

                if outcome.cache_updated {
                    if let Some(path) = &self.context.cache_path {
                        automation.cache_saved =
                            fail_open("selector cache save", || outcome.cache.save(path)).is_some();
                    }
                }
            }
            Err(e) => warn!("Browser launch failed, falling back to manual entry: {}", e),
        }

        fail_open("staged profile cleanup", || staged.cleanup());
        automation
    }

    fn manual_code<C>(&self, auth_url: &str, prompt: &mut C) -> Result<String>
    where
        C: CodePrompt + ?Sized,
    {
        println!();
        println!("Could not complete the login automatically.");
        println!("Open this URL, approve access and paste the code shown:");
        println!("{}", auth_url);

        if self.context.open_fallback {
            fail_open("open auth URL", || open::that(auth_url).map_err(AutoAuthError::from));
        }

        prompt
            .prompt(MANUAL_PROMPT)?
            .ok_or_else(|| AutoAuthError::Other("No authorization code entered".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_config() {
        let mut config = AutoAuthConfig::default();
        config.cache.enabled = false;
        config.browser.profiles_root = Some(PathBuf::from("/profiles"));
        config.login.drain_idle_secs = 2;

        let context = LoginContext::from_config(&config).unwrap();
        assert!(context.cache_path.is_none());
        assert_eq!(context.profiles_root().unwrap(), PathBuf::from("/profiles"));
        assert_eq!(context.drain.idle, Duration::from_secs(2));
        assert_eq!(context.drain.total, Duration::from_secs(30));
        assert_eq!(context.driver.max_attempts, 20);
        assert!(!context.open_fallback);
    }

    #[test]
    fn test_context_rejects_bad_pattern() {
        let mut config = AutoAuthConfig::default();
        config.login.url_pattern = "(".to_string();
        assert!(matches!(
            LoginContext::from_config(&config),
            Err(AutoAuthError::Config(_))
        ));
    }
}
