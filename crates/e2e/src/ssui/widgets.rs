//! SSUI widget bindings
//!
//! Each widget owns a browser handle and knows its selectors; the selector
//! builders are public so fakes can script the same elements.

use applab_common::version::pick;
use applab_common::{wait_for, ApplianceVersion, WaitError, WaitOptions};
use std::time::Duration;

use crate::browser::{xpath, xpath_literal, BrowserHandle};
use crate::error::{NavResult, NavigationError};

/// How long a confirmation notification may take to appear
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Breadcrumb holding the page title
pub const ACTIVE_BREADCRUMB: &str = r#"xpath=//li[@class="active"]"#;

/// Title of the modal dialogs
pub const MODAL_LABEL: &str = r#"xpath=//h4[@id="myModalLabel"]"#;

/// Element found by a fixed selector
#[derive(Clone)]
pub struct Element {
    browser: BrowserHandle,
    selector: String,
}

impl Element {
    pub fn new(browser: &BrowserHandle, selector: impl Into<String>) -> Self {
        Self {
            browser: browser.clone(),
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.browser.is_visible(&self.selector).await?)
    }

    /// Trimmed inner text, empty when the element is absent
    pub async fn text(&self) -> NavResult<String> {
        let text = self.browser.text(&self.selector).await?;
        Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
    }

    pub async fn attribute(&self, name: &str) -> NavResult<Option<String>> {
        Ok(self.browser.attribute(&self.selector, name).await?)
    }

    pub async fn click(&self) -> NavResult<()> {
        Ok(self.browser.click(&self.selector).await?)
    }

    pub async fn fill(&self, value: &str) -> NavResult<()> {
        Ok(self.browser.fill(&self.selector, value).await?)
    }

    /// Choose an option of a `<select>` by label
    pub async fn select(&self, label: &str) -> NavResult<()> {
        Ok(self.browser.select_option(&self.selector, label).await?)
    }
}

pub fn button(text: &str) -> String {
    xpath(format!("//button[normalize-space(.)={}]", xpath_literal(text)))
}

pub fn input(name: &str) -> String {
    format!("input[name=\"{}\"]", name)
}

/// `<select>` placed under a form label
pub fn labelled_select(label: &str) -> String {
    xpath(format!(
        "//select[../../../label[normalize-space(text())={}]]",
        xpath_literal(label)
    ))
}

/// Dropdown button that opens a menu of actions
#[derive(Clone)]
pub struct Dropdown {
    browser: BrowserHandle,
    label: String,
    menu_in_body: bool,
}

impl Dropdown {
    pub fn new(browser: &BrowserHandle, label: impl Into<String>) -> Self {
        Self {
            browser: browser.clone(),
            label: label.into(),
            menu_in_body: false,
        }
    }

    /// Dropdown whose menu is appended to `<body>` rather than nested
    pub fn appended_to_body(browser: &BrowserHandle, label: impl Into<String>) -> Self {
        Self {
            menu_in_body: true,
            ..Self::new(browser, label)
        }
    }

    pub fn toggle_selector(label: &str) -> String {
        xpath(format!(
            "//div[contains(@class, \"dropdown\")]/button[contains(normalize-space(.), {})]",
            xpath_literal(label)
        ))
    }

    pub fn item_selector(label: &str, item: &str, menu_in_body: bool) -> String {
        if menu_in_body {
            xpath(format!(
                "//body/ul[contains(@class, \"dropdown-menu\")]/li/a[normalize-space(.)={}]",
                xpath_literal(item)
            ))
        } else {
            xpath(format!(
                "//div[contains(@class, \"dropdown\")][button[contains(normalize-space(.), {})]]//ul/li/a[normalize-space(.)={}]",
                xpath_literal(label),
                xpath_literal(item)
            ))
        }
    }

    pub async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.browser.is_visible(&Self::toggle_selector(&self.label)).await?)
    }

    pub async fn item_select(&self, item: &str) -> NavResult<()> {
        self.browser.click(&Self::toggle_selector(&self.label)).await?;
        self.browser
            .click(&Self::item_selector(&self.label, item, self.menu_in_body))
            .await?;
        Ok(())
    }
}

/// Three-dot action menu
#[derive(Clone)]
pub struct Kebab {
    browser: BrowserHandle,
}

impl Kebab {
    pub const TOGGLE: &'static str = r#"xpath=//button[@id="dropdownKebab"]"#;

    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            browser: browser.clone(),
        }
    }

    pub fn item_selector(item: &str) -> String {
        xpath(format!(
            "//ul[@aria-labelledby=\"dropdownKebab\"]/li/a[normalize-space(.)={}]",
            xpath_literal(item)
        ))
    }

    pub async fn select(&self, item: &str) -> NavResult<()> {
        self.browser.click(Self::TOGGLE).await?;
        self.browser.click(&Self::item_selector(item)).await?;
        Ok(())
    }
}

/// Power operations menu, a labelled dropdown before 5.10 and a kebab after
#[derive(Clone)]
pub enum PowerOperations {
    Dropdown(Dropdown),
    Kebab(Kebab),
}

impl PowerOperations {
    pub fn for_version(browser: &BrowserHandle, version: &ApplianceVersion) -> Self {
        let use_kebab = pick(version, &[(None, false), (Some("5.10"), true)])
            .copied()
            .unwrap_or(false);
        if use_kebab {
            PowerOperations::Kebab(Kebab::new(browser))
        } else {
            PowerOperations::Dropdown(Dropdown::new(browser, "Power Operations"))
        }
    }

    pub async fn select(&self, operation: &str) -> NavResult<()> {
        match self {
            PowerOperations::Dropdown(dropdown) => dropdown.item_select(operation).await,
            PowerOperations::Kebab(kebab) => kebab.select(operation).await,
        }
    }
}

/// List of services on the My Services page
#[derive(Clone)]
pub struct ServiceList {
    browser: BrowserHandle,
}

impl ServiceList {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            browser: browser.clone(),
        }
    }

    pub fn item_selector(name: &str) -> String {
        xpath(format!(
            "//div[contains(@class, \"list-group-item\")]//*[normalize-space(.)={}]",
            xpath_literal(name)
        ))
    }

    pub async fn is_item_displayed(&self, name: &str) -> NavResult<bool> {
        Ok(self.browser.is_visible(&Self::item_selector(name)).await?)
    }

    pub async fn click_at(&self, name: &str) -> NavResult<()> {
        Ok(self.browser.click(&Self::item_selector(name)).await?)
    }
}

/// Vertical navigation bar
#[derive(Clone)]
pub struct NavigationBar {
    browser: BrowserHandle,
}

impl NavigationBar {
    pub const ROOT: &'static str = r#"xpath=//div[contains(@class, "nav-pf-vertical")]"#;
    pub const ACTIVE: &'static str =
        r#"xpath=//div[contains(@class, "nav-pf-vertical")]//li[contains(@class, "active")]/a"#;

    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            browser: browser.clone(),
        }
    }

    pub fn item_selector(item: &str) -> String {
        xpath(format!(
            "//div[contains(@class, \"nav-pf-vertical\")]//li/a[normalize-space(.)={}]",
            xpath_literal(item)
        ))
    }

    pub async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.browser.is_visible(Self::ROOT).await?)
    }

    pub async fn select(&self, item: &str) -> NavResult<()> {
        Ok(self.browser.click(&Self::item_selector(item)).await?)
    }

    pub async fn currently_selected(&self) -> NavResult<String> {
        let text = self.browser.text(Self::ACTIVE).await?;
        Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
    }
}

/// Toast notifications
#[derive(Clone)]
pub struct Notification {
    browser: BrowserHandle,
}

impl Notification {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            browser: browser.clone(),
        }
    }

    pub fn message_selector(message: &str) -> String {
        xpath(format!(
            "//div[contains(@class, \"toast-pf\")][contains(normalize-space(.), {})]",
            xpath_literal(message)
        ))
    }

    pub async fn has_message(&self, message: &str) -> NavResult<bool> {
        Ok(self.browser.is_visible(&Self::message_selector(message)).await?)
    }

    /// Wait for a notification containing `message`
    pub async fn assert_message(&self, message: &str) -> NavResult<()> {
        let options = WaitOptions::new(NOTIFICATION_TIMEOUT, Duration::from_secs(1))
            .handle_exception(true)
            .message(format!("notification {:?}", message));

        match wait_for(&options, || self.has_message(message)).await {
            Ok(_) => Ok(()),
            Err(WaitError::Timeout { .. }) => Err(NavigationError::Assertion(format!(
                "no notification containing {:?}",
                message
            ))),
            Err(WaitError::Predicate(e)) => Err(e),
        }
    }
}
