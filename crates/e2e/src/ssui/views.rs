//! SSUI page views

use applab_common::version::pick;
use applab_common::ApplianceVersion;
use async_trait::async_trait;

use crate::browser::{xpath, xpath_literal, BrowserHandle};
use crate::error::NavResult;
use crate::ssui::widgets::{
    button, input, labelled_select, Dropdown, Element, NavigationBar, Notification, PowerOperations,
    ServiceList, ACTIVE_BREADCRUMB, MODAL_LABEL,
};
use crate::view::View;

/// Login form fields
pub const LOGIN_USERNAME: &str = "#inputUsername";
pub const LOGIN_PASSWORD: &str = "#inputPassword";
pub const LOGIN_SUBMIT: &str = r#"xpath=//button[@type="submit"]"#;

/// Logged-in user shown in the masthead
pub const CURRENT_USER: &str =
    r#"xpath=//nav//li[contains(@class, "dropdown")]/a[contains(@class, "nav-item-iconic")]"#;

/// Any page behind the login
pub struct LoggedInView {
    pub navigation: NavigationBar,
    pub current_user: Element,
    username: String,
}

impl LoggedInView {
    pub fn new(browser: &BrowserHandle, username: impl Into<String>) -> Self {
        Self {
            navigation: NavigationBar::new(browser),
            current_user: Element::new(browser, CURRENT_USER),
            username: username.into(),
        }
    }

    pub async fn logged_in_as_current_user(&self) -> NavResult<bool> {
        Ok(self.current_user.text().await?.contains(&self.username))
    }
}

#[async_trait]
impl View for LoggedInView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.navigation.is_displayed().await? && self.logged_in_as_current_user().await?)
    }
}

pub struct MyServicesView {
    pub base: LoggedInView,
    pub title: Element,
    pub service: ServiceList,
    pub notification: Notification,
}

impl MyServicesView {
    pub fn new(browser: &BrowserHandle, username: impl Into<String>) -> Self {
        Self {
            base: LoggedInView::new(browser, username),
            title: Element::new(browser, ACTIVE_BREADCRUMB),
            service: ServiceList::new(browser),
            notification: Notification::new(browser),
        }
    }

    pub async fn in_myservices(&self) -> NavResult<bool> {
        Ok(self.base.logged_in_as_current_user().await?
            && self.base.navigation.currently_selected().await? == "My Services")
    }
}

#[async_trait]
impl View for MyServicesView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.in_myservices().await? && self.title.text().await? == "My Services")
    }
}

pub struct DetailsMyServiceView {
    pub services: MyServicesView,
    pub policy: Dropdown,
    pub power_operations: PowerOperations,
    pub access_dropdown: Dropdown,
    pub remove_service: Element,
    pub configuration: Dropdown,
    pub lifecycle: Dropdown,
    pub console_button: Element,
    pub resource_power_status: Element,
    service_name: String,
}

impl DetailsMyServiceView {
    pub fn new(
        browser: &BrowserHandle,
        username: impl Into<String>,
        service_name: impl Into<String>,
        version: &ApplianceVersion,
    ) -> Self {
        Self {
            services: MyServicesView::new(browser, username),
            policy: Dropdown::new(browser, "Policy"),
            power_operations: PowerOperations::for_version(browser, version),
            access_dropdown: Dropdown::appended_to_body(browser, "Access"),
            remove_service: Element::new(browser, button("Remove Service")),
            configuration: Dropdown::new(browser, "Configuration"),
            lifecycle: Dropdown::new(browser, "Lifecycle"),
            console_button: Element::new(
                browser,
                r#"xpath=//button[contains(@class, "open-console-button") and @title="HTML5 console"]"#,
            ),
            resource_power_status: Element::new(
                browser,
                r#"xpath=//span/i[contains(@class, "pficon") and contains(@uib-tooltip, "Power State")]"#,
            ),
            service_name: service_name.into(),
        }
    }

    /// Power state from the resource icon tooltip, e.g. `on`
    pub async fn power_status(&self) -> NavResult<Option<String>> {
        let tooltip = self.resource_power_status.attribute("uib-tooltip").await?;
        Ok(tooltip.and_then(|t| t.split(": ").nth(1).map(str::to_string)))
    }
}

#[async_trait]
impl View for DetailsMyServiceView {
    async fn is_displayed(&self) -> NavResult<bool> {
        if !self.services.in_myservices().await? {
            return Ok(false);
        }
        let title = self.services.title.text().await?;
        Ok(title == self.service_name || title == "Service Details")
    }
}

pub struct EditMyServiceView {
    pub title: Element,
    pub name: Element,
    pub description: Element,
    pub save_button: Element,
    pub reset_button: Element,
    pub cancel_button: Element,
}

impl EditMyServiceView {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            title: Element::new(browser, MODAL_LABEL),
            name: Element::new(browser, input("name")),
            description: Element::new(browser, input("description")),
            save_button: Element::new(browser, button("Save")),
            reset_button: Element::new(browser, button("Reset")),
            cancel_button: Element::new(browser, button("Cancel")),
        }
    }
}

#[async_trait]
impl View for EditMyServiceView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.name.is_displayed().await? && self.title.text().await? == "Edit Service")
    }
}

pub struct SetOwnershipView {
    pub title: Element,
    pub select_owner: Element,
    pub select_group: Element,
    pub save_button: Element,
}

impl SetOwnershipView {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            title: Element::new(browser, r#"xpath=//*[@id="myModalLabel"]"#),
            select_owner: Element::new(browser, labelled_select("Select an Owner")),
            select_group: Element::new(browser, labelled_select("Select a Group")),
            save_button: Element::new(browser, button("Save")),
        }
    }
}

#[async_trait]
impl View for SetOwnershipView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.select_owner.is_displayed().await? && self.title.text().await? == "Set Service Ownership")
    }
}

pub struct TagPageView {
    pub title: Element,
    pub tag_category: Element,
    pub tag_name: Element,
    pub add_tag: Element,
    pub save: Element,
    pub reset: Element,
    pub cancel: Element,
}

impl TagPageView {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            title: Element::new(browser, MODAL_LABEL),
            tag_category: Element::new(browser, r#"xpath=//select[contains(@class, "tag-category-select")]"#),
            tag_name: Element::new(browser, r#"xpath=//select[contains(@class, "tag-value-select")]"#),
            add_tag: Element::new(browser, r#"xpath=//a/span[contains(@class, "tag-add")]"#),
            save: Element::new(browser, button("Save")),
            reset: Element::new(browser, button("Reset")),
            cancel: Element::new(browser, button("Cancel")),
        }
    }
}

#[async_trait]
impl View for TagPageView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.title.text().await? == "Edit Tags"
            && self.tag_category.is_displayed().await?
            && self.tag_name.is_displayed().await?)
    }
}

pub struct RemoveServiceView {
    pub title: Element,
    pub remove: Element,
    pub cancel: Element,
}

impl RemoveServiceView {
    pub fn new(browser: &BrowserHandle) -> Self {
        Self {
            title: Element::new(browser, MODAL_LABEL),
            remove: Element::new(browser, button("Yes, Remove Service")),
            cancel: Element::new(browser, button("Cancel")),
        }
    }
}

#[async_trait]
impl View for RemoveServiceView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.remove.is_displayed().await? && self.title.text().await? == "Remove Service")
    }
}

pub struct RetireServiceView {
    pub title: Element,
    pub retire: Element,
    pub cancel: Element,
    expected_title: &'static str,
}

impl RetireServiceView {
    pub fn new(browser: &BrowserHandle, version: &ApplianceVersion) -> Self {
        let retire_label = pick(version, &[(None, "Yes, Retire Service Now"), (Some("5.10"), "OK")])
            .copied()
            .unwrap_or("OK");
        let expected_title = pick(version, &[(None, "Retire Service Now"), (Some("5.10"), "Retire Services")])
            .copied()
            .unwrap_or("Retire Services");

        Self {
            title: Element::new(browser, r#"xpath=//h4[@class="modal-title"]"#),
            retire: Element::new(browser, button(retire_label)),
            cancel: Element::new(browser, button("Cancel")),
            expected_title,
        }
    }
}

#[async_trait]
impl View for RetireServiceView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.retire.is_displayed().await? && self.title.text().await? == self.expected_title)
    }
}

pub struct MyServiceVMDetailsView {
    pub services: MyServicesView,
    pub snapshots: Dropdown,
    pub power_operations: Dropdown,
    pub timeline: Element,
}

impl MyServiceVMDetailsView {
    pub fn new(browser: &BrowserHandle, username: impl Into<String>) -> Self {
        Self {
            services: MyServicesView::new(browser, username),
            snapshots: Dropdown::new(browser, "Snapshots"),
            power_operations: Dropdown::new(browser, "Power Operations"),
            timeline: Element::new(browser, xpath(format!("//*[@class={}]", xpath_literal("timeline")))),
        }
    }
}

#[async_trait]
impl View for MyServiceVMDetailsView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(self.services.in_myservices().await?
            && self.timeline.is_displayed().await?
            && self.power_operations.is_displayed().await?)
    }
}
