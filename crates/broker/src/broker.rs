//! Pool acquisition with backend fallback and guaranteed release

use applab_common::{PoolId, ResourceRequest, TemplateType};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::{BrokerApi, ProvisionedPool};
use crate::appliance::Appliance;
use crate::error::{AttemptFailure, BrokerError, BrokerResult};

/// Appliances acquired together and released together
///
/// Deliberately not `Clone`: a pool has exactly one owner and is consumed by
/// [`ResourceBroker::release`].
#[derive(Debug)]
pub struct ResourcePool {
    pool_id: PoolId,
    members: Vec<Appliance>,
    backend: String,
    template_type: TemplateType,
    failures: Vec<AttemptFailure>,
}

impl ResourcePool {
    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn template_type(&self) -> TemplateType {
        self.template_type
    }

    pub fn members(&self) -> &[Appliance] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Appliance] {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Backends that failed before this pool was obtained
    pub fn failures(&self) -> &[AttemptFailure] {
        &self.failures
    }
}

/// Acquires appliance pools from a broker
pub struct ResourceBroker<B: BrokerApi> {
    api: Arc<B>,
}

impl<B: BrokerApi> Clone for ResourceBroker<B> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<B: BrokerApi> ResourceBroker<B> {
    pub fn new(api: B) -> Self {
        Self { api: Arc::new(api) }
    }

    pub fn from_arc(api: Arc<B>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &B {
        &self.api
    }

    /// Backends that are both available on the broker and permitted
    pub async fn usable_backends(&self, permitted: &BTreeSet<String>) -> BrokerResult<BTreeSet<String>> {
        let available = self.api.available_backends().await?;
        Ok(available.intersection(permitted).cloned().collect())
    }

    /// Provision a pool from the first candidate backend that succeeds.
    ///
    /// Candidates are tried in sorted order. A failing backend is logged and
    /// skipped; once one succeeds no further backend is contacted.
    pub async fn acquire(
        &self,
        request: &ResourceRequest,
        candidates: &BTreeSet<String>,
    ) -> BrokerResult<ResourcePool> {
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for backend in candidates {
            match self.attempt(request, backend).await {
                Ok(provisioned) => {
                    info!(
                        "Acquired pool {} with {} appliance(s) from {}",
                        provisioned.pool_id,
                        provisioned.members.len(),
                        backend
                    );
                    return Ok(ResourcePool {
                        pool_id: provisioned.pool_id,
                        members: provisioned.members,
                        backend: backend.clone(),
                        template_type: provisioned.template_type,
                        failures,
                    });
                }
                Err(e) => {
                    warn!("Couldn't provision appliance from {}: {}", backend, e);
                    failures.push(AttemptFailure {
                        backend: backend.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        error!("Couldn't provision an appliance at all");
        Err(BrokerError::NoProvisionAvailable { attempted: failures })
    }

    /// One backend attempt; a pool of the wrong size counts as a failure
    async fn attempt(&self, request: &ResourceRequest, backend: &str) -> BrokerResult<ProvisionedPool> {
        let provisioned = self.api.provision(request, backend).await?;

        let expected = request.desired_count();
        if provisioned.members.len() != expected as usize {
            let ProvisionedPool { pool_id, members, .. } = provisioned;
            if let Err(e) = self.api.destroy_pool(&pool_id).await {
                warn!("Failed to destroy incomplete pool {}: {}", pool_id, e);
            }
            return Err(BrokerError::IncompletePool {
                pool_id,
                expected,
                got: members.len(),
            });
        }

        Ok(provisioned)
    }

    /// Close member sessions and destroy the pool on the broker.
    ///
    /// Session close failures are logged and do not stop the teardown; a
    /// failing `destroy_pool` call is returned to the caller.
    pub async fn release(&self, mut pool: ResourcePool) -> BrokerResult<()> {
        for app in pool.members.iter_mut() {
            if let Err(e) = app.close_session().await {
                warn!("Failed to close session to {}: {}", app.name, e);
            }
        }

        self.api.destroy_pool(&pool.pool_id).await?;
        info!("Released pool {} on {}", pool.pool_id, pool.backend);
        Ok(())
    }

    /// Run `body` with a freshly acquired pool and release it afterwards.
    ///
    /// The pool is released whether `body` returns `Ok`, returns `Err` or
    /// panics; a panic is resumed once the release has finished. When the
    /// body failed, a release error is only logged so the body's error wins.
    pub async fn with_pool<T, E, F>(
        &self,
        request: &ResourceRequest,
        candidates: &BTreeSet<String>,
        body: F,
    ) -> Result<T, E>
    where
        E: From<BrokerError>,
        F: for<'p> FnOnce(&'p mut ResourcePool) -> BoxFuture<'p, Result<T, E>>,
    {
        let mut pool = self.acquire(request, candidates).await?;

        let outcome = AssertUnwindSafe(body(&mut pool)).catch_unwind().await;
        let pool_id = pool.pool_id.clone();
        let released = self.release(pool).await;

        match outcome {
            Ok(Ok(value)) => {
                released?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(release_err) = released {
                    error!("Failed to release pool {}: {}", pool_id, release_err);
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(release_err) = released {
                    error!("Failed to release pool {} after panic: {}", pool_id, release_err);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

impl<B: BrokerApi + 'static> ResourceBroker<B> {
    /// Acquire a pool wrapped in a guard that releases it when dropped
    pub async fn acquire_guarded(
        &self,
        request: &ResourceRequest,
        candidates: &BTreeSet<String>,
    ) -> BrokerResult<PoolGuard<B>> {
        let pool = self.acquire(request, candidates).await?;
        Ok(PoolGuard {
            broker: self.clone(),
            pool: Some(pool),
        })
    }
}

/// Owns a pool and releases it exactly once.
///
/// Prefer [`PoolGuard::release`]; dropping the guard instead schedules the
/// release on the current tokio runtime.
pub struct PoolGuard<B: BrokerApi + 'static> {
    broker: ResourceBroker<B>,
    pool: Option<ResourcePool>,
}

impl<B: BrokerApi + 'static> PoolGuard<B> {
    /// Release the pool now and wait for it
    pub async fn release(mut self) -> BrokerResult<()> {
        match self.pool.take() {
            Some(pool) => self.broker.release(pool).await,
            None => Ok(()),
        }
    }
}

impl<B: BrokerApi + 'static> Deref for PoolGuard<B> {
    type Target = ResourcePool;

    fn deref(&self) -> &ResourcePool {
        self.pool.as_ref().expect("pool is held until the guard is consumed")
    }
}

impl<B: BrokerApi + 'static> DerefMut for PoolGuard<B> {
    fn deref_mut(&mut self) -> &mut ResourcePool {
        self.pool.as_mut().expect("pool is held until the guard is consumed")
    }
}

impl<B: BrokerApi + 'static> Drop for PoolGuard<B> {
    fn drop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let broker = self.broker.clone();
                handle.spawn(async move {
                    let pool_id = pool.pool_id.clone();
                    if let Err(e) = broker.release(pool).await {
                        error!("Failed to release pool {} from guard: {}", pool_id, e);
                    }
                });
            }
            Err(_) => {
                error!(
                    "Pool {} dropped outside a tokio runtime and was not released",
                    pool.pool_id
                );
            }
        }
    }
}
