//! applab common library
//!
//! Shared error types, configuration, version handling and the bounded
//! polling primitive used by the broker client and the navigator.

pub mod config;
pub mod error;
pub mod types;
pub mod version;
pub mod wait;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use error::{Error, Result};
pub use types::*;
pub use version::ApplianceVersion;
pub use wait::{wait_for, Truthy, WaitError, WaitOptions};

/// applab version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
