//! applab UI navigation
//!
//! This crate resolves named navigation steps against a browser:
//! - Steps are registered per entity type in an explicit [`StepRegistry`]
//! - Each step names at most one prerequisite, on the same or a related entity
//! - [`Navigator`] walks the chain, runs each transition and verifies the view
//! - Playwright drives the browser through a long-lived node process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Navigator<D>                            │
//! │    navigate_to(entity, step, params) -> Box<dyn View>       │
//! │      ├── resolve prerequisite (sibling | related entity)    │
//! │      ├── run transition (NavigateStep::step)                │
//! │      └── verify landed view (wait_for is_displayed)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepRegistry<D>                                            │
//! │    (entity type, step name) -> step, prerequisite edge      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Browser (trait)          PlaywrightBrowser                 │
//! │    goto, click, fill  ──▶  node driver.js (JSON lines)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ssui: SsuiServer::LoggedIn ◀── MyService::All ◀── Details  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod error;
pub mod navigator;
pub mod playwright;
pub mod ssui;
pub mod view;

pub use browser::{Browser, BrowserHandle};
pub use error::{BrowserError, BrowserResult, NavResult, NavigationError};
pub use navigator::{NavigateStep, Navigation, Navigator, Prerequisite, StepContext, StepRegistry};
pub use playwright::PlaywrightBrowser;
pub use view::{wait_displayed, NavParams, View};
