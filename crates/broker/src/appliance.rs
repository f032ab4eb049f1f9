//! Provisioned appliances and their control sessions

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use applab_common::wait::{wait_for, WaitError, WaitOptions};

use crate::error::{BrokerError, BrokerResult};

/// A closable control channel held open to an appliance
#[async_trait]
pub trait Session: Send + Sync {
    async fn close(&mut self) -> BrokerResult<()>;
}

/// One appliance handed out by the broker
pub struct Appliance {
    pub name: String,
    pub hostname: String,
    pub url: String,
    session: Option<Box<dyn Session>>,
}

impl Appliance {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            url: url.into(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach a session, closing any previous one first
    pub async fn attach_session(&mut self, session: Box<dyn Session>) -> BrokerResult<()> {
        self.close_session().await?;
        self.session = Some(session);
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Open an SSH control session to this appliance
    pub async fn open_ssh(&mut self, user: &str) -> BrokerResult<&mut Self> {
        let session = SshSession::open(&self.hostname, user).await?;
        self.attach_session(Box::new(session)).await?;
        Ok(self)
    }

    /// Close the held session, if any. The session is dropped even when
    /// closing fails.
    pub async fn close_session(&mut self) -> BrokerResult<()> {
        match self.session.take() {
            Some(mut session) => session.close().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appliance")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("url", &self.url)
            .field("session", &self.session.is_some())
            .finish()
    }
}

/// SSH master connection multiplexed through a control socket
pub struct SshSession {
    target: String,
    control_dir: tempfile::TempDir,
    master: Option<Child>,
}

impl SshSession {
    /// Start a master connection to `user@host`
    pub async fn open(host: &str, user: &str) -> BrokerResult<Self> {
        let control_dir = tempfile::tempdir()?;
        let target = format!("{}@{}", user, host);

        let mut session = Self {
            target,
            control_dir,
            master: None,
        };

        let child = Command::new("ssh")
            .args(session.base_args())
            .args(["-N", "-o", "ControlMaster=yes"])
            .arg(&session.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrokerError::Session {
                appliance: host.to_string(),
                reason: format!("failed to spawn ssh: {}", e),
            })?;
        session.master = Some(child);

        let ready = WaitOptions::new(Duration::from_secs(30), Duration::from_millis(200))
            .message(format!("ssh master to {}", host));
        if let Err(e) = control_socket_ready(&session.control_path(), &ready).await {
            if let Err(close_err) = session.close().await {
                warn!("Failed to close ssh master to {}: {}", host, close_err);
            }
            return Err(BrokerError::Session {
                appliance: host.to_string(),
                reason: format!("ssh master did not come up: {}", e),
            });
        }

        debug!("SSH session open to {}", session.target);
        Ok(session)
    }

    fn control_path(&self) -> PathBuf {
        self.control_dir.path().join("control.sock")
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path().display()),
        ]
    }

    /// Run a command over the master connection, returning stdout
    pub async fn run_command(&self, command: &str) -> BrokerResult<String> {
        trace!("ssh {}: {}", self.target, command);
        let output = Command::new("ssh")
            .args(self.base_args())
            .arg(&self.target)
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(BrokerError::Session {
                appliance: self.target.clone(),
                reason: format!(
                    "`{}` exited with {}: {}",
                    command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Session for SshSession {
    async fn close(&mut self) -> BrokerResult<()> {
        let Some(mut master) = self.master.take() else {
            return Ok(());
        };

        // Ask the master to exit, then make sure the process is gone
        let _ = Command::new("ssh")
            .args(self.base_args())
            .args(["-O", "exit"])
            .arg(&self.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let _ = master.start_kill();
        master.wait().await.map_err(|e| BrokerError::Session {
            appliance: self.target.clone(),
            reason: format!("failed to reap ssh master: {}", e),
        })?;

        debug!("SSH session to {} closed", self.target);
        Ok(())
    }
}

/// The ssh master is usable once its control socket exists
async fn control_socket_ready(socket: &Path, options: &WaitOptions) -> Result<(), WaitError<BrokerError>> {
    wait_for(options, move || async move { Ok::<_, BrokerError>(socket.exists()) }).await?;
    Ok(())
}
