//! Selector cache
//!
//! Remembers which consent-button selectors clicked successfully on the last
//! run so the next run tries them first. The cache is an explicit value: it is
//! loaded at the process boundary, handed to the consent driver, returned with
//! the run's successes folded in, and saved again by the caller.
//!
//! On disk it is a small JSON object:
//!
//! ```json
//! { "consent_selectors": ["..."], "last_working": ["..."] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::Result;

/// Consent buttons tried when the cache has nothing better
pub const DEFAULT_CONSENT_SELECTORS: &[&str] = &[
    r#"button:has-text("Continue")"#,
    r#"button:has-text("Allow")"#,
    r#"div[role="button"]:has-text("Continue")"#,
    r#"div[role="button"]:has-text("Allow")"#,
    "#submit_approve_access",
    r#"button[type="submit"]"#,
];

/// Selectors for the account chooser entry belonging to `email`
pub fn account_selectors(email: &str) -> Vec<String> {
    vec![
        format!(r#"[data-identifier="{}"]"#, email),
        format!("text={}", email),
    ]
}

/// Persisted selector priorities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCache {
    /// Extra consent selectors curated by the operator
    #[serde(default)]
    pub consent_selectors: Vec<String>,

    /// Selectors that clicked successfully on the most recent run, in order
    #[serde(default)]
    pub last_working: Vec<String>,
}

impl SelectorCache {
    /// Load the cache; a missing or unreadable file yields the empty cache
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No selector cache at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(cache) => cache.normalized(),
            Err(e) => {
                warn!("Ignoring corrupt selector cache {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the cache as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!("Saved selector cache to {}", path.display());
        Ok(())
    }

    /// Attempt order: last working, then curated, then `defaults`, no repeats
    pub fn prioritized<S: AsRef<str>>(&self, defaults: &[S]) -> Vec<String> {
        dedup_preserving_order(
            self.last_working
                .iter()
                .map(String::as_str)
                .chain(self.consent_selectors.iter().map(String::as_str))
                .chain(defaults.iter().map(|s| s.as_ref())),
        )
    }

    /// Record a run's successful selectors as the new `last_working` list
    ///
    /// Returns `false` (and leaves the cache untouched) when nothing succeeded.
    pub fn remember<S: AsRef<str>>(&mut self, successes: &[S]) -> bool {
        if successes.is_empty() {
            return false;
        }
        self.last_working = dedup_preserving_order(successes.iter().map(|s| s.as_ref()));
        true
    }

    /// Add a curated consent selector unless it is already present
    pub fn add_consent_selector(&mut self, selector: &str) -> bool {
        if self.consent_selectors.iter().any(|s| s == selector) {
            return false;
        }
        self.consent_selectors.push(selector.to_string());
        true
    }

    fn normalized(self) -> Self {
        Self {
            consent_selectors: dedup_preserving_order(
                self.consent_selectors.iter().map(String::as_str),
            ),
            last_working: dedup_preserving_order(self.last_working.iter().map(String::as_str)),
        }
    }
}

/// Remove repeats, keeping the first occurrence of each selector
pub fn dedup_preserving_order<'a, I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}
