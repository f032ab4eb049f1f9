//! Pool Commands

use anyhow::{bail, Result};
use applab_broker::{Appliance, BrokerApi, BrokerClient, PoolGuard, ResourceBroker};
use applab_common::{ApplianceVersion, HarnessConfig, PoolId, ResourceRequest};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::output::{print_info, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ProvisionArgs {
    /// Number of appliances in the pool
    #[arg(short, long, default_value = "1")]
    pub count: u32,

    /// Request preconfigured appliances
    #[arg(long)]
    pub configured: bool,

    /// Appliance version, e.g. 5.10.1 or master
    #[arg(long = "version", value_name = "VERSION")]
    pub appliance_version: String,

    /// Backend to try; repeatable. Defaults to the configured FQDN providers
    #[arg(long = "backend")]
    pub backends: Vec<String>,

    /// Keep the pool until Ctrl-C, then destroy it
    #[arg(long)]
    pub hold: bool,
}

#[derive(Serialize)]
pub struct MemberDisplay {
    pub name: String,
    pub hostname: String,
    pub url: String,
}

impl From<&Appliance> for MemberDisplay {
    fn from(app: &Appliance) -> Self {
        Self {
            name: app.name.clone(),
            hostname: app.hostname.clone(),
            url: app.url.clone(),
        }
    }
}

impl TableDisplay for MemberDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Hostname", "URL"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.hostname.clone(), self.url.clone()]
    }
}

/// Backends to try: explicit ones, else the FQDN providers, else everything
async fn candidates(
    broker: &ResourceBroker<BrokerClient>,
    config: &HarnessConfig,
    explicit: &[String],
) -> Result<BTreeSet<String>> {
    let permitted: BTreeSet<String> = if !explicit.is_empty() {
        explicit.iter().cloned().collect()
    } else if !config.fqdn_providers.is_empty() {
        config.fqdn_providers.iter().cloned().collect()
    } else {
        return Ok(broker.api().available_backends().await?);
    };

    Ok(broker.usable_backends(&permitted).await?)
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub async fn provision(args: ProvisionArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let version = ApplianceVersion::parse(&args.appliance_version)?;
    let request = ResourceRequest::for_version(&version, args.configured, args.count)?;

    let broker = super::connect(config)?;
    let candidates = candidates(&broker, config, &args.backends).await?;
    if candidates.is_empty() {
        bail!("No usable backend on {}", config.broker.url);
    }
    info!("Candidate backends: {:?}", candidates);

    let bar = spinner(format!(
        "Provisioning {} appliance(s) of {} ({})",
        request.desired_count(),
        request.version(),
        request.stream()
    ));

    if !args.hold {
        let pool = broker.acquire(&request, &candidates).await;
        bar.finish_and_clear();
        let pool = pool?;

        let members: Vec<MemberDisplay> = pool.members().iter().map(MemberDisplay::from).collect();
        print_success(&format!(
            "Pool {} from {} ({})",
            pool.pool_id(),
            pool.backend(),
            pool.template_type().label()
        ));
        print_list(&members, format)?;
        print_info(&format!("Destroy it with: applab destroy {}", pool.pool_id()));
        return Ok(());
    }

    let guard = broker.acquire_guarded(&request, &candidates).await;
    bar.finish_and_clear();
    let guard = guard?;

    let members: Vec<MemberDisplay> = guard.members().iter().map(MemberDisplay::from).collect();
    print_success(&format!(
        "Pool {} from {} ({})",
        guard.pool_id(),
        guard.backend(),
        guard.template_type().label()
    ));
    print_list(&members, format)?;
    for failure in guard.failures() {
        print_warning(&format!("Skipped {}", failure));
    }
    print_info("Holding pool, press Ctrl-C to destroy it");

    let pool_id = hold(guard, tokio::signal::ctrl_c()).await?;
    print_success(&format!("Pool {} destroyed", pool_id));
    Ok(())
}

/// Keep the pool until `signal` resolves, then release it.
///
/// The release runs even when waiting for the signal fails; the runtime
/// shuts down on return and would drop a release left to the guard.
async fn hold<B, S>(guard: PoolGuard<B>, signal: S) -> Result<PoolId>
where
    B: BrokerApi + 'static,
    S: Future<Output = std::io::Result<()>>,
{
    let waited = signal.await;
    let pool_id = guard.pool_id().clone();
    guard.release().await?;
    waited?;
    Ok(pool_id)
}

pub async fn destroy(pool_id: String, config: &HarnessConfig) -> Result<()> {
    let broker = super::connect(config)?;
    let pool_id = PoolId::new(pool_id);
    broker.api().destroy_pool(&pool_id).await?;
    print_success(&format!("Pool {} destroyed", pool_id));
    Ok(())
}

pub async fn status(pool_id: String, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let broker = super::connect(config)?;
    let pool_id = PoolId::new(pool_id);
    let status = broker.api().request_check(&pool_id).await?;

    let state = match (status.finished, status.fulfilled) {
        (false, _) => format!("in progress ({}%)", status.progress.unwrap_or_default()),
        (true, true) => "fulfilled".to_string(),
        (true, false) => "finished without appliances".to_string(),
    };
    print_info(&format!(
        "Pool {}: {} ({})",
        pool_id,
        state,
        status.template_type().label()
    ));

    let members: Vec<MemberDisplay> = status
        .appliances
        .iter()
        .map(|record| MemberDisplay {
            name: record.name.clone(),
            hostname: record.ip_address.clone(),
            url: record
                .url
                .clone()
                .unwrap_or_else(|| format!("https://{}", record.ip_address)),
        })
        .collect();
    if !members.is_empty() {
        print_list(&members, format)?;
    }
    Ok(())
}

pub async fn prolong(pool_id: String, minutes: u32, config: &HarnessConfig) -> Result<()> {
    let broker = super::connect(config)?;
    let pool_id = PoolId::new(pool_id);
    broker.api().prolong_pool(&pool_id, minutes).await?;
    print_success(&format!("Pool {} lease extended by {} minute(s)", pool_id, minutes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use applab_broker::{BrokerResult, ProvisionedPool};
    use applab_common::TemplateType;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct OneBackend {
        destroyed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BrokerApi for OneBackend {
        async fn available_backends(&self) -> BrokerResult<BTreeSet<String>> {
            Ok(BTreeSet::from(["rhv-fqdn".to_string()]))
        }

        async fn provision(&self, _request: &ResourceRequest, _backend: &str) -> BrokerResult<ProvisionedPool> {
            Ok(ProvisionedPool {
                pool_id: PoolId::new("held"),
                members: vec![Appliance::new("app-0", "10.0.0.10", "https://10.0.0.10")],
                template_type: TemplateType::VirtualMachine,
            })
        }

        async fn destroy_pool(&self, pool_id: &PoolId) -> BrokerResult<()> {
            self.destroyed.lock().push(pool_id.to_string());
            Ok(())
        }
    }

    async fn held_pool() -> (ResourceBroker<OneBackend>, PoolGuard<OneBackend>) {
        let broker = ResourceBroker::new(OneBackend::default());
        let request = ResourceRequest::new(1, false, "5.10.0.3", "downstream-510z").unwrap();
        let candidates = BTreeSet::from(["rhv-fqdn".to_string()]);
        let guard = broker.acquire_guarded(&request, &candidates).await.unwrap();
        (broker, guard)
    }

    #[tokio::test]
    async fn test_hold_releases_on_signal() {
        let (broker, guard) = held_pool().await;

        let pool_id = hold(guard, async { Ok(()) }).await.unwrap();

        assert_eq!(pool_id, PoolId::new("held"));
        assert_eq!(*broker.api().destroyed.lock(), vec!["held"]);
    }

    #[tokio::test]
    async fn test_hold_releases_when_signal_fails() {
        let (broker, guard) = held_pool().await;

        let result = hold(guard, async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler"))
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("no signal handler"));
        assert_eq!(*broker.api().destroyed.lock(), vec!["held"]);
    }
}
