//! Core types shared across applab

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::version::ApplianceVersion;
use crate::{Error, Result};

/// Identifier of a provisioned appliance pool on the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub String);

impl PoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A request for a set of appliances; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    desired_count: u32,
    configured: bool,
    version: String,
    stream: String,
}

impl ResourceRequest {
    pub fn new(
        desired_count: u32,
        configured: bool,
        version: impl Into<String>,
        stream: impl Into<String>,
    ) -> Result<Self> {
        if desired_count == 0 {
            return Err(Error::InvalidRequest(
                "desired_count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            desired_count,
            configured,
            version: version.into(),
            stream: stream.into(),
        })
    }

    /// Request appliances matching an existing appliance's version
    pub fn for_version(version: &ApplianceVersion, configured: bool, count: u32) -> Result<Self> {
        Self::new(count, configured, version.to_string(), version.stream())
    }

    pub fn desired_count(&self) -> u32 {
        self.desired_count
    }

    pub fn configured(&self) -> bool {
        self.configured
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }
}

/// Kind of template a pool is provisioned from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    #[default]
    VirtualMachine,
    DockerVm,
    OpenshiftPod,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::VirtualMachine => "virtual_machine",
            TemplateType::DockerVm => "docker_vm",
            TemplateType::OpenshiftPod => "openshift_pod",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemplateType::VirtualMachine => "Virtual Machine",
            TemplateType::DockerVm => "VM-based Docker container",
            TemplateType::OpenshiftPod => "Openshift pod",
        }
    }

    /// Template type for pool records that predate the field
    ///
    /// Such records only know whether they were containers; containers of
    /// that era were always Docker-in-VM.
    pub fn for_legacy_pool(is_container: bool) -> Self {
        if is_container {
            TemplateType::DockerVm
        } else {
            TemplateType::VirtualMachine
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "virtual_machine" => Ok(TemplateType::VirtualMachine),
            "docker_vm" => Ok(TemplateType::DockerVm),
            "openshift_pod" => Ok(TemplateType::OpenshiftPod),
            other => Err(Error::UnknownTemplateType(other.to_string())),
        }
    }
}
