//! Services owned by the logged-in user, and what can be done to them

use applab_common::{wait_for, ApplianceVersion, WaitOptions};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::browser::BrowserHandle;
use crate::error::NavResult;
use crate::navigator::Navigator;
use crate::ssui::server::SsuiServer;
use crate::ssui::views::{
    DetailsMyServiceView, EditMyServiceView, MyServicesView, RemoveServiceView, RetireServiceView,
    SetOwnershipView, TagPageView,
};
use crate::view::{wait_displayed, NavParams};

pub type SsuiNavigator = Navigator<BrowserHandle>;

/// How long a page may take to come back after a form is submitted
const LANDED: Duration = Duration::from_secs(20);

/// A provisioned service as seen from the self-service UI
#[derive(Debug, Clone)]
pub struct MyService {
    pub name: String,
    /// Name of the VM the service provisioned
    pub vm_name: String,
    pub server: Arc<SsuiServer>,
}

/// Fields to change on a service; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ServiceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

impl MyService {
    pub fn new(name: impl Into<String>, vm_name: impl Into<String>, server: Arc<SsuiServer>) -> Self {
        Self {
            name: name.into(),
            vm_name: vm_name.into(),
            server,
        }
    }

    pub fn version(&self) -> &ApplianceVersion {
        &self.server.version
    }

    pub fn services_view(&self, browser: &BrowserHandle) -> MyServicesView {
        MyServicesView::new(browser, &self.server.username)
    }

    pub fn details_view(&self, browser: &BrowserHandle) -> DetailsMyServiceView {
        DetailsMyServiceView::new(browser, &self.server.username, &self.name, self.version())
    }

    /// Edit name and description; an empty update cancels the form
    pub async fn update(&mut self, nav: &SsuiNavigator, updates: &ServiceUpdate) -> NavResult<()> {
        let view: Box<EditMyServiceView> = nav.navigate_to_view(&*self, "Edit", NavParams::new()).await?;

        if updates.is_empty() {
            view.cancel_button.click().await?;
            return Ok(());
        }

        if let Some(name) = &updates.name {
            view.name.fill(name).await?;
        }
        if let Some(description) = &updates.description {
            view.description.fill(description).await?;
        }
        view.save_button.click().await?;

        let edited = format!("{} was edited.", self.name);
        if let Some(name) = &updates.name {
            self.name = name.clone();
        }
        let details = self.details_view(nav.driver());
        details.services.notification.assert_message(&edited).await?;
        info!("Service {} updated", self.name);
        Ok(())
    }

    pub async fn set_ownership(&self, nav: &SsuiNavigator, owner: &str, group: &str) -> NavResult<()> {
        let view: Box<SetOwnershipView> = nav
            .navigate_to_view(self, "SetOwnership", NavParams::new())
            .await?;
        view.select_owner.select(owner).await?;
        view.select_group.select(group).await?;
        view.save_button.click().await?;

        let details = self.details_view(nav.driver());
        wait_displayed(&details, LANDED).await?;
        let message = if self.version().at_least("5.8") {
            "Setting ownership.".to_string()
        } else {
            format!("{} ownership was saved.", self.name)
        };
        details.services.notification.assert_message(&message).await?;

        // the details page keeps the old owner until reloaded
        nav.driver().refresh().await?;
        Ok(())
    }

    pub async fn edit_tags(&self, nav: &SsuiNavigator, category: &str, value: &str) -> NavResult<()> {
        let view: Box<TagPageView> = nav
            .navigate_to_view(self, "EditTagsFromDetails", NavParams::new())
            .await?;
        view.tag_category.select(category).await?;
        view.tag_name.select(value).await?;
        view.add_tag.click().await?;
        view.save.click().await?;

        let details = self.details_view(nav.driver());
        wait_displayed(&details, LANDED).await?;
        details.services.notification.assert_message("Tagging successful.").await
    }

    pub async fn delete(&self, nav: &SsuiNavigator) -> NavResult<()> {
        let details: Box<DetailsMyServiceView> = nav.navigate_to_view(self, "Details", NavParams::new()).await?;
        if self.version().at_least("5.8") {
            details.configuration.item_select("Remove").await?;
        } else {
            details.remove_service.click().await?;
        }

        let browser = nav.driver();
        let dialog = RemoveServiceView::new(browser);
        wait_displayed(&dialog, LANDED).await?;
        dialog.remove.click().await?;

        let services = self.services_view(browser);
        wait_displayed(&services, Duration::from_secs(300)).await?;
        services
            .notification
            .assert_message(&format!("{} was removed.", self.name))
            .await?;
        info!("Service {} removed", self.name);
        Ok(())
    }

    pub async fn retire(&self, nav: &SsuiNavigator) -> NavResult<()> {
        let view: Box<RetireServiceView> = nav.navigate_to_view(self, "Retire", NavParams::new()).await?;
        view.retire.click().await?;

        let browser = nav.driver();
        if self.version().at_least("5.10") {
            let details = self.details_view(browser);
            wait_displayed(&details, LANDED).await?;
            details
                .services
                .notification
                .assert_message("Service Retire - Request Created")
                .await?;
        } else {
            let services = self.services_view(browser);
            wait_displayed(&services, LANDED).await?;
            services
                .notification
                .assert_message(&format!("{} was retired.", self.name))
                .await?;
        }
        info!("Service {} retired", self.name);
        Ok(())
    }

    /// Run a power operation such as `Start` or `Stop` from the details page
    pub async fn service_power(&self, nav: &SsuiNavigator, operation: &str) -> NavResult<()> {
        let details: Box<DetailsMyServiceView> = nav.navigate_to_view(self, "Details", NavParams::new()).await?;
        details.power_operations.select(operation).await?;
        wait_displayed(&*details, Duration::from_secs(60)).await
    }

    /// Open the VM console and wait for `console_open` to see its window
    pub async fn launch_vm_console<F, Fut>(&self, nav: &SsuiNavigator, console_open: F) -> NavResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NavResult<bool>>,
    {
        nav.navigate_to(self, "VM Console", NavParams::new()).await?;
        let options = WaitOptions::new(Duration::from_secs(30), Duration::from_secs(2))
            .handle_exception(true)
            .message(format!("VM console of {} to open", self.vm_name));
        wait_for(&options, console_open).await?;
        Ok(())
    }
}
