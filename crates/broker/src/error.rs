//! Error types for broker operations

use applab_common::PoolId;
use std::fmt;
use thiserror::Error;

/// Failure of one backend during acquisition
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub backend: String,
    pub error: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.error)
    }
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("No provision available (tried {} backend(s))", .attempted.len())]
    NoProvisionAvailable { attempted: Vec<AttemptFailure> },

    #[error("Broker raised {class}: {message}")]
    Rpc { class: String, message: String },

    #[error("Malformed broker response: {0}")]
    MalformedResponse(String),

    #[error("Pool {pool_id} has {got} member(s), expected {expected}")]
    IncompletePool {
        pool_id: PoolId,
        expected: u32,
        got: usize,
    },

    #[error("Provisioning request {pool_id} did not finish: {reason}")]
    ProvisionTimeout { pool_id: PoolId, reason: String },

    #[error("Session error on {appliance}: {reason}")]
    Session { appliance: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] applab_common::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
