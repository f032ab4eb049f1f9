//! Views: observable UI states produced by navigation steps

use applab_common::{wait_for, WaitOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{NavResult, NavigationError};

/// Upcast helper so trait objects can be downcast to their concrete view
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// A UI state that can tell whether it is currently shown
#[async_trait]
pub trait View: AsAny {
    /// Short name used in logs and errors
    fn view_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn is_displayed(&self) -> NavResult<bool>;
}

impl dyn View {
    pub fn is<V: View>(&self) -> bool {
        self.as_any().is::<V>()
    }

    pub fn downcast_ref<V: View>(&self) -> Option<&V> {
        self.as_any().downcast_ref::<V>()
    }

    /// Take ownership of the concrete view
    pub fn downcast<V: View>(self: Box<Self>) -> NavResult<Box<V>> {
        let actual = self.view_name();
        self.into_any()
            .downcast::<V>()
            .map_err(|_| NavigationError::ViewMismatch {
                expected: std::any::type_name::<V>(),
                actual,
            })
    }
}

/// Wait up to `timeout` for `view` to report itself displayed
pub async fn wait_displayed(view: &dyn View, timeout: Duration) -> NavResult<()> {
    let options = WaitOptions::new(timeout, Duration::from_secs(1))
        .handle_exception(true)
        .message(format!("{} to be displayed", view.view_name()));
    wait_for(&options, move || view.is_displayed()).await?;
    Ok(())
}

/// Keyword parameters handed to a step's transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavParams(BTreeMap<String, Value>);

impl NavParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
