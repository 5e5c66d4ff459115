//! Consent driver
//!
//! Walks the provider's account chooser and consent screens until an
//! authorization code shows up. Each iteration:
//! 1. checks the page for a code (URL first, page text as a fallback)
//! 2. otherwise clicks the first visible consent selector, in priority order
//! 3. if nothing was clickable, waits (bounded) for navigation or for one of
//!    the top selectors to appear
//!
//! Click failures are failed attempts, never errors. The loop ends on a code,
//! when the attempt budget runs out, or when the page URL can no longer be
//! read because the browser went away.

use autoauth_core::config::{AccountConfig, AutomationConfig};
use autoauth_core::extract::{default_chain, CodeExtractor, CodeSource};
use autoauth_core::fail_open::attempt;
use autoauth_core::selectors::{account_selectors, SelectorCache, DEFAULT_CONSENT_SELECTORS};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{AutoAuthError, Result};
use crate::page::AuthPage;

/// Timing and behavior of the consent loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub max_attempts: usize,
    pub click_timeout: Duration,
    pub account_timeout: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
    pub wait_for_top: usize,
    pub scrape_page_text: bool,
    pub account_email: Option<String>,
}

impl DriverSettings {
    pub fn from_config(automation: &AutomationConfig, account: &AccountConfig) -> Self {
        Self {
            max_attempts: automation.max_attempts,
            click_timeout: Duration::from_millis(automation.click_timeout_ms),
            account_timeout: Duration::from_millis(automation.account_timeout_ms),
            wait_timeout: Duration::from_millis(automation.wait_timeout_ms),
            poll_interval: Duration::from_millis(automation.poll_interval_ms),
            settle: Duration::from_millis(automation.settle_ms),
            wait_for_top: automation.wait_for_top,
            scrape_page_text: automation.scrape_page_text,
            account_email: account.email.clone(),
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&AutomationConfig::default(), &AccountConfig::default())
    }
}

/// Why the consent loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    CodeFound,
    AttemptsExhausted,
    /// Navigation to the auth URL failed
    NavigationFailed(String),
    /// The browser stopped answering
    SessionLost(String),
}

/// Result of one drive, including the cache handed back to the caller
#[derive(Debug, Clone)]
pub struct DriveOutcome {
    pub code: Option<String>,
    pub attempts: usize,
    /// Consent selectors that were clicked, in click order
    pub successes: Vec<String>,
    pub stop: StopReason,
    /// The input cache with this run's successes remembered
    pub cache: SelectorCache,
    /// Whether `cache` differs from the one passed in
    pub cache_updated: bool,
}

/// Drives the account chooser and consent screens
pub struct ConsentDriver {
    settings: DriverSettings,
    extractors: Vec<Box<dyn CodeExtractor>>,
    default_selectors: Vec<String>,
}

impl ConsentDriver {
    pub fn new(settings: DriverSettings) -> Self {
        let extractors = default_chain(settings.scrape_page_text);
        Self {
            settings,
            extractors,
            default_selectors: DEFAULT_CONSENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the code extraction chain
    pub fn with_extractors(mut self, extractors: Vec<Box<dyn CodeExtractor>>) -> Self {
        self.extractors = extractors;
        self
    }

    /// Replace the built-in consent selectors
    pub fn with_default_selectors(mut self, selectors: Vec<String>) -> Self {
        self.default_selectors = selectors;
        self
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Run the flow on `page` starting at `url`
    pub async fn drive<P>(&self, page: &P, url: &str, cache: SelectorCache) -> DriveOutcome
    where
        P: AuthPage + ?Sized,
    {
        let order = cache.prioritized(&self.default_selectors);
        let mut successes = Vec::new();
        let mut attempts = 0;

        let (code, stop) = match page.navigate(url).await {
            Err(e) => {
                warn!("Could not open auth URL: {}", e);
                (None, StopReason::NavigationFailed(e.to_string()))
            }
            Ok(()) => {
                sleep(self.settings.settle).await;
                self.select_account(page).await;
                self.consent_loop(page, &order, &mut successes, &mut attempts)
                    .await
            }
        };

        let mut cache = cache;
        let cache_updated = cache.remember(successes.as_slice());

        DriveOutcome {
            code,
            attempts,
            successes,
            stop,
            cache,
            cache_updated,
        }
    }

    async fn select_account<P>(&self, page: &P)
    where
        P: AuthPage + ?Sized,
    {
        let Some(email) = self.settings.account_email.as_deref() else {
            return;
        };

        for selector in account_selectors(email) {
            let clicked = attempt("account click", || {
                page.click_if_visible(&selector, self.settings.account_timeout)
            })
            .await
            .unwrap_or(false);
            if clicked {
                info!("Selected account {}", email);
                sleep(self.settings.settle).await;
                return;
            }
        }
        debug!("Account chooser not shown for {}", email);
    }

    async fn consent_loop<P>(
        &self,
        page: &P,
        order: &[String],
        successes: &mut Vec<String>,
        attempts: &mut usize,
    ) -> (Option<String>, StopReason)
    where
        P: AuthPage + ?Sized,
    {
        for iteration in 1..=self.settings.max_attempts {
            *attempts = iteration;

            match self.find_code(page).await {
                Ok(Some(code)) => return (Some(code), StopReason::CodeFound),
                Ok(None) => {}
                Err(e) => return (None, StopReason::SessionLost(e.to_string())),
            }

            if let Some(selector) = self.click_first(page, order).await {
                debug!("Attempt {}: clicked {}", iteration, selector);
                successes.push(selector);
                sleep(self.settings.settle).await;
                continue;
            }

            debug!("Attempt {}: nothing clickable, waiting", iteration);
            let top = &order[..order.len().min(self.settings.wait_for_top)];
            if let Err(e) = self.wait_for_change(page, top).await {
                return (None, StopReason::SessionLost(e.to_string()));
            }
        }

        // The last click may have produced the code
        match self.find_code(page).await {
            Ok(Some(code)) => (Some(code), StopReason::CodeFound),
            Ok(None) => {
                warn!("No authorization code after {} attempts", self.settings.max_attempts);
                (None, StopReason::AttemptsExhausted)
            }
            Err(e) => (None, StopReason::SessionLost(e.to_string())),
        }
    }

    /// Run the extractor chain; only a lost session is an error
    async fn find_code<P>(&self, page: &P) -> Result<Option<String>>
    where
        P: AuthPage + ?Sized,
    {
        let mut url: Option<String> = None;
        let mut text: Option<String> = None;

        for extractor in &self.extractors {
            let haystack = match extractor.source() {
                CodeSource::Url => {
                    if url.is_none() {
                        url = Some(page.current_url().await?);
                    }
                    url.as_deref()
                }
                CodeSource::PageText => {
                    if text.is_none() {
                        text = attempt("page text read", || page.page_text()).await;
                    }
                    text.as_deref()
                }
            };

            if let Some(code) = haystack.and_then(|h| extractor.extract(h)) {
                info!("Found authorization code via {}", extractor.name());
                return Ok(Some(code));
            }
        }
        Ok(None)
    }

    /// Click the first selector that becomes visible within the click timeout
    async fn click_first<P>(&self, page: &P, order: &[String]) -> Option<String>
    where
        P: AuthPage + ?Sized,
    {
        for selector in order {
            let clicked = attempt("consent click", || {
                page.click_if_visible(selector, self.settings.click_timeout)
            })
            .await
            .unwrap_or(false);
            if clicked {
                return Some(selector.clone());
            }
        }
        None
    }

    /// Wait until the URL changes or a top selector appears, bounded by the wait timeout
    async fn wait_for_change<P>(&self, page: &P, top: &[String]) -> Result<()>
    where
        P: AuthPage + ?Sized,
    {
        let start_url = page.current_url().await?;
        let deadline = Instant::now() + self.settings.wait_timeout;

        loop {
            sleep(self.settings.poll_interval).await;

            match page.current_url().await {
                Ok(url) if url != start_url => return Ok(()),
                Ok(_) => {}
                Err(e @ AutoAuthError::Browser(_)) => return Err(e),
                Err(e) => debug!("URL check failed while waiting: {}", e),
            }

            for selector in top {
                if attempt("visibility check", || page.is_visible(selector))
                    .await
                    .unwrap_or(false)
                {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Ok(());
            }
        }
    }
}
