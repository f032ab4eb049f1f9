//! Prerequisite resolution against a recording driver

use applab_common::WaitOptions;
use applab_e2e::{
    NavParams, NavResult, NavigateStep, NavigationError, Navigator, Prerequisite, StepContext, StepRegistry, View,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Driver that records every transition and display check
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    hidden: Mutex<HashSet<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl Recorder {
    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

type Driver = Arc<Recorder>;

struct PageView {
    page: &'static str,
    recorder: Driver,
}

#[async_trait]
impl View for PageView {
    async fn is_displayed(&self) -> NavResult<bool> {
        self.recorder.record(format!("verify {}", self.page));
        Ok(!self.recorder.hidden.lock().contains(self.page))
    }
}

struct OtherView;

#[async_trait]
impl View for OtherView {
    async fn is_displayed(&self) -> NavResult<bool> {
        Ok(true)
    }
}

/// Step landing on `page`, whatever the entity
struct Step<E> {
    page: &'static str,
    prerequisite: fn() -> Prerequisite<E>,
}

fn page<E>(page: &'static str, prerequisite: fn() -> Prerequisite<E>) -> Step<E> {
    Step { page, prerequisite }
}

#[async_trait]
impl<E: Send + Sync + 'static> NavigateStep<Driver> for Step<E> {
    type Entity = E;

    fn prerequisite(&self) -> Prerequisite<E> {
        (self.prerequisite)()
    }

    fn view(&self, driver: &Driver, _entity: &E) -> Box<dyn View> {
        Box::new(PageView {
            page: self.page,
            recorder: driver.clone(),
        })
    }

    async fn step(&self, cx: StepContext<'_, Driver, E>) -> NavResult<()> {
        let from = cx
            .prerequisite_view
            .and_then(|v| v.downcast_ref::<PageView>())
            .map(|v| format!(" from {}", v.page))
            .unwrap_or_default();
        cx.driver.record(format!("step {}{}", self.page, from));

        if cx.driver.failing.lock().contains(self.page) {
            return Err(NavigationError::Assertion(format!("{} did not load", self.page)));
        }
        Ok(())
    }
}

struct Widget;

struct Server;

struct Gadget {
    server: Arc<Server>,
}

fn verify() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(1), Duration::from_millis(100))
}

fn widget_registry() -> StepRegistry<Driver> {
    let mut registry = StepRegistry::new();
    registry
        .register("All", page::<Widget>("all", || Prerequisite::None))
        .unwrap()
        .register("Details", page::<Widget>("details", || Prerequisite::sibling("All")))
        .unwrap();
    registry
}

fn navigator(registry: StepRegistry<Driver>) -> (Navigator<Driver>, Driver) {
    let driver = Driver::default();
    let nav = Navigator::new(registry, driver.clone(), verify()).unwrap();
    (nav, driver)
}

#[tokio::test]
async fn test_details_runs_all_first() {
    let (nav, driver) = navigator(widget_registry());

    let view = nav.navigate_to(&Widget, "Details", NavParams::new()).await.unwrap();

    assert_eq!(view.downcast_ref::<PageView>().unwrap().page, "details");
    assert_eq!(
        driver.log(),
        vec!["step all", "verify all", "step details from all", "verify details"]
    );
}

#[tokio::test]
async fn test_root_step_has_no_prerequisite() {
    let (nav, driver) = navigator(widget_registry());

    nav.navigate_to(&Widget, "All", NavParams::new()).await.unwrap();

    assert_eq!(driver.log(), vec!["step all", "verify all"]);
}

#[tokio::test]
async fn test_each_call_resolves_afresh() {
    let (nav, driver) = navigator(widget_registry());

    nav.navigate_to(&Widget, "Details", NavParams::new()).await.unwrap();
    nav.navigate_to(&Widget, "Details", NavParams::new()).await.unwrap();

    let log = driver.log();
    assert_eq!(log.iter().filter(|e| *e == "step all").count(), 2);
    assert_eq!(log.iter().filter(|e| *e == "step details from all").count(), 2);
}

#[tokio::test]
async fn test_unknown_step() {
    let (nav, driver) = navigator(widget_registry());

    let err = nav
        .navigate_to(&Widget, "Missing", NavParams::new())
        .await
        .err()
        .unwrap();

    match err {
        NavigationError::UnknownStep { entity, step } => {
            assert_eq!(entity, "Widget");
            assert_eq!(step, "Missing");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(driver.log().is_empty());
}

#[test]
fn test_duplicate_step_rejected() {
    let mut registry = widget_registry();

    let err = registry
        .register("All", page::<Widget>("again", || Prerequisite::None))
        .err()
        .unwrap();

    assert!(matches!(err, NavigationError::DuplicateStep { ref step, .. } if step == "All"));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_same_name_on_other_entity_is_fine() {
    let mut registry = widget_registry();
    registry
        .register("All", page::<Server>("servers", || Prerequisite::None))
        .unwrap();

    assert_eq!(registry.steps_for::<Widget>(), vec!["All", "Details"]);
    assert_eq!(registry.steps_for::<Server>(), vec!["All"]);
}

#[test]
fn test_dangling_prerequisite_rejected() {
    let mut registry: StepRegistry<Driver> = StepRegistry::new();
    registry
        .register("Details", page::<Widget>("details", || Prerequisite::sibling("All")))
        .unwrap();

    let err = Navigator::new(registry, Driver::default(), verify()).err().unwrap();

    assert!(matches!(err, NavigationError::UnknownStep { ref step, .. } if step == "All"));
}

#[test]
fn test_cycle_rejected() {
    let mut registry: StepRegistry<Driver> = StepRegistry::new();
    registry
        .register("A", page::<Widget>("a", || Prerequisite::sibling("B")))
        .unwrap()
        .register("B", page::<Widget>("b", || Prerequisite::sibling("A")))
        .unwrap();

    match registry.validate() {
        Err(NavigationError::CyclicPrerequisite { chain }) => {
            assert_eq!(chain, vec!["Widget::A", "Widget::B", "Widget::A"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unverified_view_fails_navigation() {
    let (nav, driver) = navigator(widget_registry());
    driver.hidden.lock().insert("details");

    let started = tokio::time::Instant::now();
    let err = nav
        .navigate_to(&Widget, "Details", NavParams::new())
        .await
        .err()
        .unwrap();

    match err {
        NavigationError::NavigationFailed { entity, step, .. } => {
            assert_eq!(entity, "Widget");
            assert_eq!(step, "Details");
        }
        other => panic!("unexpected error: {}", other),
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed <= Duration::from_millis(1100));
}

#[tokio::test]
async fn test_failing_transition_is_wrapped() {
    let (nav, driver) = navigator(widget_registry());
    driver.failing.lock().insert("details");

    let err = nav
        .navigate_to(&Widget, "Details", NavParams::new())
        .await
        .err()
        .unwrap();

    match err {
        NavigationError::StepFailed { entity, step, source } => {
            assert_eq!(entity, "Widget");
            assert_eq!(step, "Details");
            assert!(matches!(*source, NavigationError::Assertion(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!driver.log().contains(&"verify details".to_string()));
}

#[tokio::test]
async fn test_related_prerequisite_runs_on_other_entity() {
    let mut registry: StepRegistry<Driver> = StepRegistry::new();
    registry
        .register("LoggedIn", page::<Server>("login", || Prerequisite::None))
        .unwrap()
        .register(
            "All",
            page::<Gadget>("gadgets", || {
                Prerequisite::related(|gadget: &Gadget| gadget.server.clone(), "LoggedIn")
            }),
        )
        .unwrap();
    let (nav, driver) = navigator(registry);
    let gadget = Gadget {
        server: Arc::new(Server),
    };

    let navigation = nav.navigate_traced(&gadget, "All", NavParams::new()).await.unwrap();

    assert_eq!(navigation.trace, vec!["Server::LoggedIn", "Gadget::All"]);
    assert_eq!(
        driver.log(),
        vec!["step login", "verify login", "step gadgets from login", "verify gadgets"]
    );
}

#[tokio::test]
async fn test_view_type_mismatch() {
    let (nav, _driver) = navigator(widget_registry());

    let err = nav
        .navigate_to_view::<Widget, OtherView>(&Widget, "All", NavParams::new())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, NavigationError::ViewMismatch { .. }));
}

#[tokio::test]
async fn test_concrete_view_returned() {
    let (nav, _driver) = navigator(widget_registry());

    let view = nav
        .navigate_to_view::<Widget, PageView>(&Widget, "Details", NavParams::new())
        .await
        .unwrap();

    assert_eq!(view.page, "details");
}
