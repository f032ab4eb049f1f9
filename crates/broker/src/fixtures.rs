//! Test fixtures that provision FQDN appliances for a scope
//!
//! Each helper acquires fresh appliances matching a reference version,
//! hands them to the body and destroys the pool afterwards.

use applab_common::{ApplianceVersion, HarnessConfig, ResourceRequest};
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use tracing::debug;

use crate::api::BrokerApi;
use crate::appliance::Appliance;
use crate::broker::{ResourceBroker, ResourcePool};
use crate::error::{BrokerError, BrokerResult};

/// Number of appliances handed out by [`FqdnAppliances::unconfigured_appliances`]
pub const MULTI_APPLIANCE_COUNT: u32 = 3;

/// Provisions appliances from the FQDN-capable backends
pub struct FqdnAppliances<B: BrokerApi> {
    broker: ResourceBroker<B>,
    permitted: BTreeSet<String>,
    version: ApplianceVersion,
}

impl<B: BrokerApi> FqdnAppliances<B> {
    /// `version` is the version of the appliance under test; provisioned
    /// appliances match it
    pub fn new(
        broker: ResourceBroker<B>,
        permitted: impl IntoIterator<Item = String>,
        version: ApplianceVersion,
    ) -> Self {
        Self {
            broker,
            permitted: permitted.into_iter().collect(),
            version,
        }
    }

    pub fn from_config(broker: ResourceBroker<B>, config: &HarnessConfig, version: ApplianceVersion) -> Self {
        Self::new(broker, config.fqdn_providers.iter().cloned(), version)
    }

    pub fn broker(&self) -> &ResourceBroker<B> {
        &self.broker
    }

    /// Backends currently usable for FQDN appliances
    pub async fn candidates(&self) -> BrokerResult<BTreeSet<String>> {
        let usable = self.broker.usable_backends(&self.permitted).await?;
        debug!("Usable FQDN backends: {:?}", usable);
        Ok(usable)
    }

    /// Run `body` with `count` appliances, configured or not
    pub async fn fqdn_appliances<T, E, F>(&self, configured: bool, count: u32, body: F) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'p> FnOnce(&'p mut ResourcePool) -> BoxFuture<'p, Result<T, E>>,
    {
        let request = ResourceRequest::for_version(&self.version, configured, count)
            .map_err(BrokerError::from)?;
        let candidates = self.candidates().await?;
        self.broker.with_pool(&request, &candidates, body).await
    }

    async fn single<T, E, F>(&self, configured: bool, body: F) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'a> FnOnce(&'a mut Appliance) -> BoxFuture<'a, Result<T, E>>,
    {
        self.fqdn_appliances(configured, 1, move |pool| {
            let pool_id = pool.pool_id().clone();
            match pool.members_mut().first_mut() {
                Some(app) => body(app),
                None => Box::pin(async move {
                    Err(E::from(BrokerError::IncompletePool {
                        pool_id,
                        expected: 1,
                        got: 0,
                    }))
                }),
            }
        })
        .await
    }

    /// One appliance that has not been through initial configuration
    pub async fn unconfigured_appliance<T, E, F>(&self, body: F) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'a> FnOnce(&'a mut Appliance) -> BoxFuture<'a, Result<T, E>>,
    {
        self.single(false, body).await
    }

    /// One fully configured appliance
    pub async fn configured_appliance<T, E, F>(&self, body: F) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'a> FnOnce(&'a mut Appliance) -> BoxFuture<'a, Result<T, E>>,
    {
        self.single(true, body).await
    }

    /// Several unconfigured appliances, e.g. for replication setups
    pub async fn unconfigured_appliances<T, E, F>(&self, body: F) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'p> FnOnce(&'p mut ResourcePool) -> BoxFuture<'p, Result<T, E>>,
    {
        self.fqdn_appliances(false, MULTI_APPLIANCE_COUNT, body).await
    }
}
