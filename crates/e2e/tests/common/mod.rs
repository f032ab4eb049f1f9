//! Scripted in-memory browser used by the SSUI tests

#![allow(dead_code)]

use applab_e2e::{Browser, BrowserError, BrowserResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// What the fake page currently shows
#[derive(Default)]
pub struct Page {
    visible: HashSet<String>,
    texts: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
}

impl Page {
    pub fn show(&mut self, selector: impl Into<String>) -> &mut Self {
        self.visible.insert(selector.into());
        self
    }

    pub fn hide(&mut self, selector: &str) -> &mut Self {
        self.visible.remove(selector);
        self
    }

    /// Set inner text, also making the element visible
    pub fn text(&mut self, selector: impl Into<String>, text: impl Into<String>) -> &mut Self {
        let selector = selector.into();
        self.visible.insert(selector.clone());
        self.texts.insert(selector, text.into());
        self
    }

    pub fn attribute(&mut self, selector: &str, name: &str, value: &str) -> &mut Self {
        self.attributes
            .insert((selector.to_string(), name.to_string()), value.to_string());
        self
    }
}

type Reaction = Box<dyn Fn(&mut Page) + Send + Sync>;

#[derive(Default)]
struct State {
    page: Page,
    actions: Vec<String>,
    reactions: HashMap<String, Reaction>,
}

/// Browser whose page changes only through scripted reactions to actions
///
/// Actions are recorded as `goto URL`, `click SELECTOR`, `fill SELECTOR=VALUE`,
/// `select SELECTOR=LABEL` and `refresh`. Clicking, filling or selecting an
/// element that is not visible fails like a real driver timing out.
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<State>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the page when `action` happens
    pub fn on<F>(&self, action: impl Into<String>, reaction: F)
    where
        F: Fn(&mut Page) + Send + Sync + 'static,
    {
        self.state.lock().reactions.insert(action.into(), Box::new(reaction));
    }

    pub fn page<F: FnOnce(&mut Page)>(&self, change: F) {
        change(&mut self.state.lock().page);
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    fn act(&self, action: String, target: Option<&str>) -> BrowserResult<()> {
        let mut state = self.state.lock();
        if let Some(selector) = target {
            if !state.page.visible.contains(selector) {
                return Err(BrowserError::Script {
                    command: action,
                    reason: format!("{} is not visible", selector),
                });
            }
        }

        state.actions.push(action.clone());
        let State { page, reactions, .. } = &mut *state;
        if let Some(reaction) = reactions.get(&action) {
            reaction(page);
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.act(format!("goto {}", url), None)
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.act(format!("click {}", selector), Some(selector))
    }

    async fn fill(&self, selector: &str, value: &str) -> BrowserResult<()> {
        self.act(format!("fill {}={}", selector, value), Some(selector))
    }

    async fn select_option(&self, selector: &str, label: &str) -> BrowserResult<()> {
        self.act(format!("select {}={}", selector, label), Some(selector))
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        Ok(self.state.lock().page.visible.contains(selector))
    }

    async fn text(&self, selector: &str) -> BrowserResult<Option<String>> {
        Ok(self.state.lock().page.texts.get(selector).cloned())
    }

    async fn attribute(&self, selector: &str, name: &str) -> BrowserResult<Option<String>> {
        let state = self.state.lock();
        Ok(state
            .page
            .attributes
            .get(&(selector.to_string(), name.to_string()))
            .cloned())
    }

    async fn refresh(&self) -> BrowserResult<()> {
        self.act("refresh".to_string(), None)
    }
}
