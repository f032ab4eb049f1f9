//! Navigation steps for services on the My Services page

use async_trait::async_trait;
use std::time::Duration;

use applab_common::{wait_for, WaitOptions};

use crate::browser::BrowserHandle;
use crate::error::NavResult;
use crate::navigator::{NavigateStep, Prerequisite, StepContext};
use crate::ssui::myservice::MyService;
use crate::ssui::views::{
    DetailsMyServiceView, EditMyServiceView, LoggedInView, MyServiceVMDetailsView, MyServicesView,
    RetireServiceView, SetOwnershipView, TagPageView,
};
use crate::view::View;

type Cx<'a> = StepContext<'a, BrowserHandle, MyService>;

/// The services list can take minutes to show a freshly ordered service
fn list_wait(what: String) -> WaitOptions {
    WaitOptions::new(Duration::from_secs(300), Duration::from_secs(5)).message(what)
}

fn details<'a>(cx: &Cx<'a>) -> NavResult<&'a DetailsMyServiceView> {
    cx.prerequisite::<DetailsMyServiceView>()
}

pub struct All;

#[async_trait]
impl NavigateStep<BrowserHandle> for All {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::related(|service: &MyService| service.server.clone(), "LoggedIn")
    }

    fn view(&self, browser: &BrowserHandle, service: &MyService) -> Box<dyn View> {
        Box::new(service.services_view(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        cx.prerequisite::<LoggedInView>()?
            .navigation
            .select("My Services")
            .await
    }
}

pub struct Details;

#[async_trait]
impl NavigateStep<BrowserHandle> for Details {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("All")
    }

    fn view(&self, browser: &BrowserHandle, service: &MyService) -> Box<dyn View> {
        Box::new(service.details_view(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        let view = cx.prerequisite::<MyServicesView>()?;
        let name = &cx.entity.name;
        wait_for(&list_wait(format!("service {} in list", name)), || {
            view.service.is_item_displayed(name)
        })
        .await?;
        view.service.click_at(name).await
    }
}

pub struct Edit;

#[async_trait]
impl NavigateStep<BrowserHandle> for Edit {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    fn view(&self, browser: &BrowserHandle, _service: &MyService) -> Box<dyn View> {
        Box::new(EditMyServiceView::new(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        details(&cx)?.configuration.item_select("Edit").await
    }
}

pub struct VmConsole;

#[async_trait]
impl NavigateStep<BrowserHandle> for VmConsole {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    // the console opens in its own window; the page itself stays on details
    fn view(&self, browser: &BrowserHandle, service: &MyService) -> Box<dyn View> {
        Box::new(service.details_view(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        let view = details(&cx)?;
        if cx.entity.version().at_least("5.8") {
            view.access_dropdown.item_select("VM Console").await
        } else {
            view.console_button.click().await
        }
    }
}

pub struct SetOwnership;

#[async_trait]
impl NavigateStep<BrowserHandle> for SetOwnership {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    fn view(&self, browser: &BrowserHandle, _service: &MyService) -> Box<dyn View> {
        Box::new(SetOwnershipView::new(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        let view = details(&cx)?;
        // the configuration menu renders late and clicking early misses it
        wait_for(&list_wait("configuration menu".to_string()), || {
            view.configuration.is_displayed()
        })
        .await?;
        view.configuration.item_select("Set Ownership").await
    }
}

pub struct EditTagsFromDetails;

#[async_trait]
impl NavigateStep<BrowserHandle> for EditTagsFromDetails {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    fn view(&self, browser: &BrowserHandle, _service: &MyService) -> Box<dyn View> {
        Box::new(TagPageView::new(browser))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        details(&cx)?.policy.item_select("Edit Tags").await
    }
}

pub struct Retire;

#[async_trait]
impl NavigateStep<BrowserHandle> for Retire {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    fn view(&self, browser: &BrowserHandle, service: &MyService) -> Box<dyn View> {
        Box::new(RetireServiceView::new(browser, service.version()))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        details(&cx)?.lifecycle.item_select("Retire").await
    }
}

pub struct VmDetails;

#[async_trait]
impl NavigateStep<BrowserHandle> for VmDetails {
    type Entity = MyService;

    fn prerequisite(&self) -> Prerequisite<MyService> {
        Prerequisite::sibling("Details")
    }

    fn view(&self, browser: &BrowserHandle, service: &MyService) -> Box<dyn View> {
        Box::new(MyServiceVMDetailsView::new(browser, &service.server.username))
    }

    async fn step(&self, cx: Cx<'_>) -> NavResult<()> {
        details(&cx)?.services.service.click_at(&cx.entity.vm_name).await
    }
}
