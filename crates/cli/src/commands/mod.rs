//! CLI Commands

pub mod backends;
pub mod pool;

use anyhow::{Context, Result};
use applab_broker::{BrokerClient, ResourceBroker};
use applab_common::HarnessConfig;

/// Broker client built from the loaded configuration
pub fn connect(config: &HarnessConfig) -> Result<ResourceBroker<BrokerClient>> {
    let client = BrokerClient::from_config(&config.broker)
        .with_context(|| format!("Failed to set up broker client for {}", config.broker.url))?;
    Ok(ResourceBroker::new(client))
}
