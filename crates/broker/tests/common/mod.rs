//! Scripted broker used by the integration tests

#![allow(dead_code)]

use applab_broker::{Appliance, BrokerApi, BrokerError, BrokerResult, ProvisionedPool, Session};
use applab_common::{PoolId, ResourceRequest, TemplateType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Available,
    Provision { backend: String, request: ResourceRequest },
    Destroy(String),
}

#[derive(Clone)]
pub enum Behavior {
    Fail(String),
    Succeed { pool_id: String, members: usize },
}

/// Session that counts closes and can be told to fail
pub struct TestSession {
    pub closed: Arc<AtomicUsize>,
    pub fail: bool,
}

#[async_trait]
impl Session for TestSession {
    async fn close(&mut self) -> BrokerResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BrokerError::Session {
                appliance: "test".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

pub struct MockBroker {
    available: BTreeSet<String>,
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<Call>>,
    pub sessions_closed: Arc<AtomicUsize>,
    pub failing_sessions: bool,
    pub destroy_fails: bool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            available: BTreeSet::new(),
            behaviors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            sessions_closed: Arc::new(AtomicUsize::new(0)),
            failing_sessions: false,
            destroy_fails: false,
        }
    }

    pub fn backend(mut self, name: &str, behavior: Behavior) -> Self {
        self.available.insert(name.to_string());
        self.behaviors.insert(name.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn provisions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Provision { backend, .. } => Some(backend),
                _ => None,
            })
            .collect()
    }

    /// Requests handed to `provision`, in call order
    pub fn requests(&self) -> Vec<ResourceRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Provision { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn destroys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Destroy(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrokerApi for MockBroker {
    async fn available_backends(&self) -> BrokerResult<BTreeSet<String>> {
        self.calls.lock().push(Call::Available);
        Ok(self.available.clone())
    }

    async fn provision(&self, request: &ResourceRequest, backend: &str) -> BrokerResult<ProvisionedPool> {
        self.calls.lock().push(Call::Provision {
            backend: backend.to_string(),
            request: request.clone(),
        });

        match self.behaviors.get(backend).cloned() {
            Some(Behavior::Succeed { pool_id, members }) => Ok(ProvisionedPool {
                pool_id: PoolId::new(pool_id),
                members: (0..members)
                    .map(|i| {
                        let host = format!("10.0.0.{}", i + 10);
                        Appliance::new(format!("app-{}", i), host.clone(), format!("https://{}", host))
                            .with_session(Box::new(TestSession {
                                closed: self.sessions_closed.clone(),
                                fail: self.failing_sessions,
                            }))
                    })
                    .collect(),
                template_type: TemplateType::VirtualMachine,
            }),
            Some(Behavior::Fail(reason)) => Err(BrokerError::Rpc {
                class: "ProvisionError".to_string(),
                message: reason,
            }),
            None => Err(BrokerError::Rpc {
                class: "ValueError".to_string(),
                message: format!("unknown provider {}", backend),
            }),
        }
    }

    async fn destroy_pool(&self, pool_id: &PoolId) -> BrokerResult<()> {
        self.calls.lock().push(Call::Destroy(pool_id.to_string()));
        if self.destroy_fails {
            return Err(BrokerError::Rpc {
                class: "Exception".to_string(),
                message: "destroy failed".to_string(),
            });
        }
        Ok(())
    }
}

pub fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn request(count: u32) -> ResourceRequest {
    ResourceRequest::new(count, false, "5.10.0.3", "downstream-510z").unwrap()
}
