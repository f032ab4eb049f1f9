//! Client for the provisioning broker's JSON API
//!
//! Every call is an HTTP POST of `{"method", "args", "kwargs", "auth"}`. The
//! broker answers `{"status": "success", "result": ...}` or
//! `{"status": "exception", "result": {"class", "message"}}`.

use applab_common::config::BrokerConfig;
use applab_common::wait::{wait_for, Pretty, WaitError, WaitOptions};
use applab_common::{PoolId, ResourceRequest, TemplateType};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, trace, warn};

use crate::api::{BrokerApi, ProvisionedPool};
use crate::appliance::Appliance;
use crate::error::{BrokerError, BrokerResult};

/// HTTP client for the broker
pub struct BrokerClient {
    http: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    provision_wait: WaitOptions,
    lease_minutes: u32,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    args: Value,
    kwargs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<(&'a str, &'a str)>,
}

#[derive(Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
enum RpcResponse {
    Success(Value),
    Exception(RpcException),
}

#[derive(Deserialize)]
struct RpcException {
    class: String,
    message: String,
}

/// Status of a provisioning request as reported by `request_check`
#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    pub finished: bool,

    #[serde(default)]
    pub fulfilled: bool,

    #[serde(default)]
    pub progress: Option<u32>,

    #[serde(default)]
    pub appliances: Vec<ApplianceRecord>,

    #[serde(default, rename = "template_type")]
    reported_template_type: Option<TemplateType>,

    #[serde(default)]
    is_container: bool,
}

impl RequestStatus {
    /// Template type of the pool; older brokers only report `is_container`
    pub fn template_type(&self) -> TemplateType {
        self.reported_template_type
            .unwrap_or_else(|| TemplateType::for_legacy_pool(self.is_container))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplianceRecord {
    pub name: String,
    pub ip_address: String,

    #[serde(default)]
    pub url: Option<String>,
}

impl ApplianceRecord {
    fn into_appliance(self) -> Appliance {
        let url = self
            .url
            .unwrap_or_else(|| format!("https://{}", self.ip_address));
        Appliance::new(self.name, self.ip_address, url)
    }
}

/// Decode a broker response body into the call's result type
pub fn decode_response<R: DeserializeOwned>(body: &str) -> BrokerResult<R> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|e| BrokerError::MalformedResponse(format!("{}: {}", e, body)))?;

    match response {
        RpcResponse::Success(value) => Ok(serde_json::from_value(value)?),
        RpcResponse::Exception(exc) => Err(BrokerError::Rpc {
            class: exc.class,
            message: exc.message,
        }),
    }
}

/// Request ids come back as numbers or strings depending on the broker version
fn pool_id_from(value: &Value) -> BrokerResult<PoolId> {
    match value {
        Value::String(s) => Ok(PoolId::new(s.clone())),
        Value::Number(n) => Ok(PoolId::new(n.to_string())),
        other => Err(BrokerError::MalformedResponse(format!(
            "unexpected request id: {}",
            other
        ))),
    }
}

impl BrokerClient {
    /// Create a client from configuration
    pub fn from_config(config: &BrokerConfig) -> BrokerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let auth = match (&config.username, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            http,
            url: config.url.clone(),
            auth,
            provision_wait: config.provision_wait(),
            lease_minutes: config.lease_minutes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke a broker method
    pub async fn call_method<R: DeserializeOwned>(
        &self,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> BrokerResult<R> {
        let request = RpcRequest {
            method,
            args,
            kwargs,
            auth: self.auth.as_ref().map(|(u, p)| (u.as_str(), p.as_str())),
        };

        trace!("broker call {}: args={} kwargs={}", method, request.args, request.kwargs);

        let body = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        trace!("broker reply {}: {}", method, body);
        decode_response(&body)
    }

    /// Current status of a provisioning request
    pub async fn request_check(&self, pool_id: &PoolId) -> BrokerResult<RequestStatus> {
        self.call_method("request_check", json!([pool_id.as_str()]), json!({}))
            .await
    }

    /// Extend the lease of a pool's appliances
    pub async fn prolong_pool(&self, pool_id: &PoolId, minutes: u32) -> BrokerResult<()> {
        let _: Value = self
            .call_method("prolong_appliance_pool_lease", json!([pool_id.as_str(), minutes]), json!({}))
            .await?;
        Ok(())
    }

    async fn wait_until_finished(&self, pool_id: &PoolId) -> BrokerResult<RequestStatus> {
        let options = self
            .provision_wait
            .clone()
            .message(format!("provisioning request {}", pool_id));

        wait_for(&options, move || async move {
            let status = self.request_check(pool_id).await?;
            Ok::<_, BrokerError>(status.finished)
        })
        .await
        .map_err(|e| match e {
            WaitError::Predicate(inner) => inner,
            timeout @ WaitError::Timeout { .. } => BrokerError::ProvisionTimeout {
                pool_id: pool_id.clone(),
                reason: timeout.to_string(),
            },
        })?;

        self.request_check(pool_id).await
    }
}

#[async_trait]
impl BrokerApi for BrokerClient {
    async fn available_backends(&self) -> BrokerResult<BTreeSet<String>> {
        let providers: Vec<String> = self
            .call_method("available_providers", json!([]), json!({}))
            .await?;
        Ok(providers.into_iter().collect())
    }

    async fn provision(&self, request: &ResourceRequest, backend: &str) -> BrokerResult<ProvisionedPool> {
        info!(
            "Requesting {} appliance(s) version {} ({}) from {}",
            request.desired_count(),
            request.version(),
            request.stream(),
            backend
        );

        let started = tokio::time::Instant::now();
        let raw_id: Value = self
            .call_method(
                "request_appliances",
                json!([]),
                json!({
                    "count": request.desired_count(),
                    "preconfigured": request.configured(),
                    "version": request.version(),
                    "stream": request.stream(),
                    "provider": backend,
                    "lease_time": self.lease_minutes,
                }),
            )
            .await?;
        let pool_id = pool_id_from(&raw_id)?;

        let status = match self.wait_until_finished(&pool_id).await {
            Ok(status) => status,
            Err(e) => {
                // Do not leave a half-built pool behind on the broker
                if let Err(destroy_err) = self.destroy_pool(&pool_id).await {
                    warn!("Failed to destroy unfinished pool {}: {}", pool_id, destroy_err);
                }
                return Err(e);
            }
        };

        let template_type = status.template_type();
        info!(
            "Pool {} finished on {} in {} (fulfilled: {}, template: {})",
            pool_id,
            backend,
            Pretty(started.elapsed()),
            status.fulfilled,
            template_type
        );

        Ok(ProvisionedPool {
            pool_id,
            template_type,
            members: status
                .appliances
                .into_iter()
                .map(ApplianceRecord::into_appliance)
                .collect(),
        })
    }

    async fn destroy_pool(&self, pool_id: &PoolId) -> BrokerResult<()> {
        let _: Value = self
            .call_method("destroy_pool", json!([pool_id.as_str()]), json!({}))
            .await?;
        info!("Destroyed pool {}", pool_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success() {
        let body = r#"{"status": "success", "result": ["rhv-fqdn", "vsphere-fqdn"]}"#;
        let providers: Vec<String> = decode_response(body).unwrap();
        assert_eq!(providers, vec!["rhv-fqdn", "vsphere-fqdn"]);
    }

    #[test]
    fn test_decode_exception() {
        let body = r#"{"status": "exception", "result": {"class": "ValueError", "message": "No such provider"}}"#;
        let err = decode_response::<Value>(body).unwrap_err();
        match err {
            BrokerError::Rpc { class, message } => {
                assert_eq!(class, "ValueError");
                assert_eq!(message, "No such provider");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_response::<Value>("<html>502</html>").unwrap_err();
        assert!(matches!(err, BrokerError::MalformedResponse(_)));
    }

    #[test]
    fn test_request_status_parsing() {
        let body = r#"{
            "status": "success",
            "result": {
                "finished": true,
                "fulfilled": true,
                "progress": 100,
                "appliances": [
                    {"name": "cfme-5103-a", "ip_address": "10.8.1.10"},
                    {"name": "cfme-5103-b", "ip_address": "10.8.1.11", "url": "https://b.example.com"}
                ]
            }
        }"#;
        let status: RequestStatus = decode_response(body).unwrap();
        assert!(status.finished);
        assert_eq!(status.appliances.len(), 2);

        let apps: Vec<Appliance> = status
            .appliances
            .into_iter()
            .map(ApplianceRecord::into_appliance)
            .collect();
        assert_eq!(apps[0].url, "https://10.8.1.10");
        assert_eq!(apps[1].url, "https://b.example.com");
    }

    #[test]
    fn test_template_type_reported() {
        let body = r#"{"status": "success", "result": {"finished": true, "template_type": "openshift_pod", "is_container": true}}"#;
        let status: RequestStatus = decode_response(body).unwrap();
        assert_eq!(status.template_type(), TemplateType::OpenshiftPod);
    }

    #[test]
    fn test_legacy_reply_backfills_template_type() {
        let body = r#"{"status": "success", "result": {"finished": true, "is_container": true}}"#;
        let status: RequestStatus = decode_response(body).unwrap();
        assert_eq!(status.template_type(), TemplateType::DockerVm);

        let body = r#"{"status": "success", "result": {"finished": false}}"#;
        let status: RequestStatus = decode_response(body).unwrap();
        assert_eq!(status.template_type(), TemplateType::VirtualMachine);
    }

    #[test]
    fn test_pool_id_from_number_or_string() {
        assert_eq!(pool_id_from(&json!(42)).unwrap(), PoolId::new("42"));
        assert_eq!(pool_id_from(&json!("p1")).unwrap(), PoolId::new("p1"));
        assert!(pool_id_from(&json!(null)).is_err());
    }

    #[test]
    fn test_request_serialization_omits_missing_auth() {
        let request = RpcRequest {
            method: "available_providers",
            args: json!([]),
            kwargs: json!({}),
            auth: None,
        };
        let body = serde_json::to_string(&request).unwrap();
        assert!(!body.contains("auth"));

        let request = RpcRequest {
            method: "destroy_pool",
            args: json!(["7"]),
            kwargs: json!({}),
            auth: Some(("ci", "secret")),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["auth"], json!(["ci", "secret"]));
    }
}
