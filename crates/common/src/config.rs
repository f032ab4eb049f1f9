//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::wait::WaitOptions;
use crate::{Error, Result};

pub const ENV_BROKER_URL: &str = "APPLAB_BROKER_URL";
pub const ENV_BROKER_USER: &str = "APPLAB_BROKER_USER";
pub const ENV_BROKER_PASSWORD: &str = "APPLAB_BROKER_PASSWORD";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Backends the harness may provision FQDN appliances from
    pub fqdn_providers: Vec<String>,

    /// Provisioning broker connection
    pub broker: BrokerConfig,

    /// Navigation engine settings
    pub navigation: NavigationConfig,

    /// Browser driver settings
    pub browser: BrowserConfig,

    /// Self-service UI target
    pub ssui: SsuiConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fqdn_providers: Vec::new(),
            broker: BrokerConfig::default(),
            navigation: NavigationConfig::default(),
            browser: BrowserConfig::default(),
            ssui: SsuiConfig::default(),
        }
    }
}

/// Broker connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// JSON API endpoint of the broker
    pub url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// How long to wait for a provisioning request to finish
    pub provision_timeout_secs: u64,

    /// Pause between provisioning status checks
    pub poll_delay_secs: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Lease requested for provisioned appliances
    pub lease_minutes: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/appliances/api".to_string(),
            username: None,
            password: None,
            provision_timeout_secs: 1800,
            poll_delay_secs: 5,
            request_timeout_secs: 60,
            lease_minutes: 120,
        }
    }
}

impl BrokerConfig {
    pub fn provision_wait(&self) -> WaitOptions {
        WaitOptions::new(
            Duration::from_secs(self.provision_timeout_secs),
            Duration::from_secs(self.poll_delay_secs),
        )
        .message("appliance provisioning")
    }
}

/// Navigation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// How long a freshly reached view may take to report itself displayed
    pub verify_timeout_ms: u64,

    /// Pause between display checks
    pub verify_delay_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: 10_000,
            verify_delay_ms: 500,
        }
    }
}

/// Which browser engine to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

/// Browser driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,

    pub headless: bool,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node.js binary used to run Playwright scripts
    pub node_binary: PathBuf,

    /// Startup timeout for the keep-alive browser
    pub launch_timeout_secs: u64,

    /// Default per-action timeout handed to Playwright
    pub action_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            launch_timeout_secs: 30,
            action_timeout_ms: 5000,
        }
    }
}

/// Self-service UI target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsuiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl Default for SsuiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1/self_service".to_string(),
            username: "admin".to_string(),
            password: "smartvm".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay broker settings from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BROKER_URL) {
            self.broker.url = url;
        }
        if let Some(user) = lookup(ENV_BROKER_USER) {
            self.broker.username = Some(user);
        }
        if let Some(password) = lookup(ENV_BROKER_PASSWORD) {
            self.broker.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.url.is_empty() {
            return Err(Error::InvalidConfig("broker.url must not be empty".to_string()));
        }
        if self.broker.poll_delay_secs == 0 {
            return Err(Error::InvalidConfig(
                "broker.poll_delay_secs must be at least 1".to_string(),
            ));
        }
        if self.broker.username.is_some() != self.broker.password.is_some() {
            return Err(Error::InvalidConfig(
                "broker.username and broker.password must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn verify_wait(&self) -> WaitOptions {
        WaitOptions::new(
            Duration::from_millis(self.navigation.verify_timeout_ms),
            Duration::from_millis(self.navigation.verify_delay_ms),
        )
    }
}

/// Default config location, `~/.applab/config.toml`
pub fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".applab")
        .join("config.toml")
}
