//! The SSUI server and its login step

use applab_common::config::SsuiConfig;
use applab_common::ApplianceVersion;
use async_trait::async_trait;
use tracing::debug;

use crate::browser::BrowserHandle;
use crate::error::NavResult;
use crate::navigator::{NavigateStep, StepContext};
use crate::ssui::views::{LoggedInView, LOGIN_PASSWORD, LOGIN_SUBMIT, LOGIN_USERNAME};
use crate::view::View;

/// Self-service UI of one appliance
#[derive(Debug, Clone)]
pub struct SsuiServer {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub version: ApplianceVersion,
}

impl SsuiServer {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        version: ApplianceVersion,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            version,
        }
    }

    pub fn from_config(config: &SsuiConfig, version: ApplianceVersion) -> Self {
        Self::new(&config.base_url, &config.username, &config.password, version)
    }
}

/// Root step: a logged-in session for the configured user
pub struct LoggedIn;

#[async_trait]
impl NavigateStep<BrowserHandle> for LoggedIn {
    type Entity = SsuiServer;

    fn view(&self, browser: &BrowserHandle, server: &SsuiServer) -> Box<dyn View> {
        Box::new(LoggedInView::new(browser, &server.username))
    }

    async fn step(&self, cx: StepContext<'_, BrowserHandle, SsuiServer>) -> NavResult<()> {
        let server = cx.entity;
        let browser = cx.driver;

        if LoggedInView::new(browser, &server.username).is_displayed().await? {
            debug!("Already logged in as {}", server.username);
            return Ok(());
        }

        browser.goto(&server.base_url).await?;
        if browser.is_visible(LOGIN_USERNAME).await? {
            debug!("Logging in to {} as {}", server.base_url, server.username);
            browser.fill(LOGIN_USERNAME, &server.username).await?;
            browser.fill(LOGIN_PASSWORD, &server.password).await?;
            browser.click(LOGIN_SUBMIT).await?;
        }
        Ok(())
    }
}
