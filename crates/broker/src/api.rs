//! The broker's remote call surface

use applab_common::{PoolId, ResourceRequest, TemplateType};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::appliance::Appliance;
use crate::error::BrokerResult;

/// Appliances returned by one successful provisioning call
#[derive(Debug)]
pub struct ProvisionedPool {
    pub pool_id: PoolId,
    pub members: Vec<Appliance>,
    pub template_type: TemplateType,
}

/// Operations a provisioning broker exposes
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Backends the broker can currently provision from
    async fn available_backends(&self) -> BrokerResult<BTreeSet<String>>;

    /// Provision `request.desired_count()` appliances on `backend`
    async fn provision(&self, request: &ResourceRequest, backend: &str) -> BrokerResult<ProvisionedPool>;

    /// Tear down a pool and every appliance in it
    async fn destroy_pool(&self, pool_id: &PoolId) -> BrokerResult<()>;
}

#[async_trait]
impl<T: BrokerApi + ?Sized> BrokerApi for Arc<T> {
    async fn available_backends(&self) -> BrokerResult<BTreeSet<String>> {
        (**self).available_backends().await
    }

    async fn provision(&self, request: &ResourceRequest, backend: &str) -> BrokerResult<ProvisionedPool> {
        (**self).provision(request, backend).await
    }

    async fn destroy_pool(&self, pool_id: &PoolId) -> BrokerResult<()> {
        (**self).destroy_pool(pool_id).await
    }
}
