//! Authorization code extraction
//!
//! Two strategies share one interface. [`UrlQueryExtractor`] reads the `code`
//! query parameter of the page URL and is the primary strategy.
//! [`PageTextExtractor`] scans rendered page text for a code-shaped token; it
//! is provider-specific and only used as a last resort.

use regex::Regex;

/// What an extractor needs to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    /// The current page URL
    Url,
    /// The visible text of the page body
    PageText,
}

/// Finds an authorization code in a piece of page state
pub trait CodeExtractor: Send + Sync {
    /// Which page state to pass to [`CodeExtractor::extract`]
    fn source(&self) -> CodeSource;

    /// Return the code if `haystack` contains one
    fn extract(&self, haystack: &str) -> Option<String>;

    /// Short name for log lines
    fn name(&self) -> &'static str;
}

/// Reads `code` from the query string
#[derive(Debug, Clone)]
pub struct UrlQueryExtractor {
    pattern: Regex,
}

impl Default for UrlQueryExtractor {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"[?&]code=([^&#]+)").expect("static regex"),
        }
    }
}

impl CodeExtractor for UrlQueryExtractor {
    fn source(&self) -> CodeSource {
        CodeSource::Url
    }

    fn extract(&self, haystack: &str) -> Option<String> {
        let raw = self.pattern.captures(haystack)?.get(1)?.as_str();
        let code = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };
        (!code.is_empty()).then_some(code)
    }

    fn name(&self) -> &'static str {
        "url-query"
    }
}

/// Scans page text for `4/` followed by 20 or more code characters
///
/// The longest match wins when several appear.
#[derive(Debug, Clone)]
pub struct PageTextExtractor {
    pattern: Regex,
}

impl Default for PageTextExtractor {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"4/[0-9A-Za-z_-]{20,}").expect("static regex"),
        }
    }
}

impl PageTextExtractor {
    /// Use a custom code pattern
    pub fn with_pattern(pattern: &str) -> crate::Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| crate::AutoAuthError::Config(format!("Invalid code pattern: {}", e)))?;
        Ok(Self { pattern })
    }
}

impl CodeExtractor for PageTextExtractor {
    fn source(&self) -> CodeSource {
        CodeSource::PageText
    }

    fn extract(&self, haystack: &str) -> Option<String> {
        self.pattern
            .find_iter(haystack)
            .map(|m| m.as_str())
            .fold(None::<&str>, |best, m| match best {
                Some(b) if b.len() >= m.len() => Some(b),
                _ => Some(m),
            })
            .map(str::to_string)
    }

    fn name(&self) -> &'static str {
        "page-text"
    }
}

/// URL extraction, optionally followed by page-text scraping
pub fn default_chain(scrape_page_text: bool) -> Vec<Box<dyn CodeExtractor>> {
    let mut chain: Vec<Box<dyn CodeExtractor>> = vec![Box::new(UrlQueryExtractor::default())];
    if scrape_page_text {
        chain.push(Box::new(PageTextExtractor::default()));
    }
    chain
}
