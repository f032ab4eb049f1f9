//! Error types for applab

use thiserror::Error;

/// Result type alias using the applab common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by every applab crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid appliance version: {0}")]
    InvalidVersion(String),

    #[error("Invalid resource request: {0}")]
    InvalidRequest(String),

    #[error("Unknown template type: {0}")]
    UnknownTemplateType(String),
}
