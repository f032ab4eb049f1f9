//! Backend listing

use anyhow::Result;
use applab_broker::BrokerApi;
use applab_common::HarnessConfig;
use serde::Serialize;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct BackendDisplay {
    pub name: String,
    pub permitted: bool,
}

impl TableDisplay for BackendDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Backend", "FQDN"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.permitted { "yes" } else { "-" }.to_string(),
        ]
    }
}

/// List backends the broker can provision from right now
pub async fn execute(config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let broker = super::connect(config)?;
    let available = broker.api().available_backends().await?;

    let items: Vec<BackendDisplay> = available
        .into_iter()
        .map(|name| BackendDisplay {
            permitted: config.fqdn_providers.contains(&name),
            name,
        })
        .collect();

    print_list(&items, format)
}
