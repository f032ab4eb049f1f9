//! applab provisioning broker client
//!
//! Acquires pools of ephemeral appliances from a remote broker, falling back
//! across candidate backends, and guarantees every acquired pool is
//! destroyed exactly once.
//!
//! ```text
//! FqdnAppliances ── usable backends = available ∩ permitted
//!       │
//! ResourceBroker::with_pool / acquire_guarded
//!       │   acquire: backend A ✗ (logged) → backend B ✓ → ResourcePool
//!       │   body(&mut pool)
//!       └── release: close sessions → destroy_pool (on every exit path)
//!       │
//! BrokerApi ── BrokerClient (JSON over HTTP)
//! ```

pub mod api;
pub mod appliance;
pub mod broker;
pub mod client;
pub mod error;
pub mod fixtures;

pub use api::{BrokerApi, ProvisionedPool};
pub use appliance::{Appliance, Session, SshSession};
pub use broker::{PoolGuard, ResourceBroker, ResourcePool};
pub use client::BrokerClient;
pub use error::{AttemptFailure, BrokerError, BrokerResult};
pub use fixtures::FqdnAppliances;
