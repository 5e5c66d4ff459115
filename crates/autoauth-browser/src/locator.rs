//! Selector strings to in-page element lookups
//!
//! Cached and default selectors are plain strings in one of three forms:
//!
//! - CSS: `#submit_approve_access`, `[data-identifier="me@example.com"]`
//! - CSS filtered by text: `button:has-text("Allow")`
//! - text: `text=me@example.com`
//!
//! Text matching is case-insensitive, whitespace-normalized substring
//! matching. Only visible elements count.

/// Parsed form of a selector string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    CssWithText { css: String, text: String },
    Text(String),
}

const HAS_TEXT: &str = ":has-text(";

impl Locator {
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();

        if let Some(text) = selector.strip_prefix("text=") {
            return Locator::Text(unquote(text).to_string());
        }

        if let Some(idx) = selector.find(HAS_TEXT) {
            if selector.ends_with(')') {
                let css = selector[..idx].trim();
                let text = &selector[idx + HAS_TEXT.len()..selector.len() - 1];
                return Locator::CssWithText {
                    css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                    text: unquote(text).to_string(),
                };
            }
        }

        Locator::Css(selector.to_string())
    }

    /// JS expression evaluating to the first visible match or `null`
    pub fn lookup_expression(&self) -> String {
        let candidates = match self {
            Locator::Css(css) => format!("all({})", js_string(css)),
            Locator::CssWithText { css, text } => format!(
                "all({}).filter(el => norm(el.innerText).includes({}))",
                js_string(css),
                js_string(&text.to_lowercase())
            ),
            Locator::Text(text) => format!(
                "deepest(all('body *').filter(el => norm(el.innerText).includes({})))",
                js_string(&text.to_lowercase())
            ),
        };

        format!(
            r#"(() => {{
    const all = (css) => {{ try {{ return Array.from(document.querySelectorAll(css)); }} catch (e) {{ return []; }} }};
    const norm = (t) => (t || '').replace(/\s+/g, ' ').trim().toLowerCase();
    const deepest = (els) => els.filter(el => !els.some(other => other !== el && el.contains(other)));
    const visible = (el) => {{
        const r = el.getBoundingClientRect();
        const s = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    }};
    return {candidates}.find(visible) || null;
}})()"#
        )
    }

    /// JS expression evaluating to whether a visible match exists
    pub fn visible_script(&self) -> String {
        format!("({}) !== null", self.lookup_expression())
    }

    /// JS expression that clicks the first visible match, evaluating to `true` if it did
    pub fn click_script(&self) -> String {
        format!(
            r#"(() => {{
    const el = {};
    if (!el) {{ return false; }}
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    return true;
}})()"#,
            self.lookup_expression()
        )
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_css() {
        assert_eq!(
            Locator::parse("#submit_approve_access"),
            Locator::Css("#submit_approve_access".into())
        );
        assert_eq!(
            Locator::parse(r#"[data-identifier="me@example.com"]"#),
            Locator::Css(r#"[data-identifier="me@example.com"]"#.into())
        );
    }

    #[test]
    fn test_parse_has_text() {
        assert_eq!(
            Locator::parse(r#"div[role="button"]:has-text("Allow")"#),
            Locator::CssWithText {
                css: r#"div[role="button"]"#.into(),
                text: "Allow".into(),
            }
        );
        assert_eq!(
            Locator::parse(":has-text('Continue')"),
            Locator::CssWithText {
                css: "*".into(),
                text: "Continue".into(),
            }
        );
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            Locator::parse("text=me@example.com"),
            Locator::Text("me@example.com".into())
        );
        assert_eq!(Locator::parse(r#"text="Allow""#), Locator::Text("Allow".into()));
    }

    #[test]
    fn test_scripts_escape_selector() {
        let locator = Locator::parse(r#"[data-identifier="a'b@example.com"]"#);
        let script = locator.click_script();
        assert!(script.contains(r#"all("[data-identifier=\"a'b@example.com\"]")"#));
        assert!(script.contains("el.click()"));
    }

    #[test]
    fn test_text_match_is_lowercased() {
        let script = Locator::parse(r#"button:has-text("Allow")"#).visible_script();
        assert!(script.contains(r#"includes("allow")"#));
        assert!(script.ends_with("!== null"));
    }
}
