//! Browser abstraction used by views and steps

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BrowserResult;

/// Minimal page-level browser control
///
/// Selectors use Playwright syntax, so `xpath=//h4` and plain CSS both work.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    async fn click(&self, selector: &str) -> BrowserResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> BrowserResult<()>;

    /// Select an option of a `<select>` by its visible label
    async fn select_option(&self, selector: &str, label: &str) -> BrowserResult<()>;

    /// Whether the first match is attached and visible; never waits
    async fn is_visible(&self, selector: &str) -> BrowserResult<bool>;

    /// Inner text of the first match, `None` if nothing matches
    async fn text(&self, selector: &str) -> BrowserResult<Option<String>>;

    async fn attribute(&self, selector: &str, name: &str) -> BrowserResult<Option<String>>;

    async fn refresh(&self) -> BrowserResult<()>;
}

/// Shared browser handle, the driver type for page navigation
pub type BrowserHandle = Arc<dyn Browser>;

/// Build an XPath selector in Playwright syntax
pub fn xpath(expr: impl AsRef<str>) -> String {
    format!("xpath={}", expr.as_ref())
}

/// Quote `value` as an XPath string literal
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
