//! Error types for navigation and browser control

use applab_common::WaitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    NotInstalled,

    #[error("Browser failed to start: {0}")]
    Launch(String),

    #[error("Browser command {command} failed: {reason}")]
    Script { command: String, reason: String },

    #[error("Browser driver exited")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("No step {step:?} registered for {entity}")]
    UnknownStep { entity: String, step: String },

    #[error("Step {step:?} is already registered for {entity}")]
    DuplicateStep { entity: String, step: String },

    #[error("Prerequisite cycle: {}", .chain.join(" -> "))]
    CyclicPrerequisite { chain: Vec<String> },

    #[error("Navigation to {step:?} for {entity} failed: {reason}")]
    NavigationFailed {
        entity: String,
        step: String,
        reason: String,
    },

    #[error("Step {step:?} for {entity} failed: {source}")]
    StepFailed {
        entity: String,
        step: String,
        #[source]
        source: Box<NavigationError>,
    },

    #[error("Expected view {expected}, got {actual}")]
    ViewMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Entity accessor for {step:?} returned {actual}, expected {expected}")]
    EntityMismatch {
        step: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl<E> From<WaitError<E>> for NavigationError
where
    E: Into<NavigationError> + std::fmt::Display,
{
    fn from(err: WaitError<E>) -> Self {
        match err {
            WaitError::Predicate(e) => e.into(),
            timeout @ WaitError::Timeout { .. } => NavigationError::Timeout(timeout.to_string()),
        }
    }
}

pub type NavResult<T> = Result<T, NavigationError>;
