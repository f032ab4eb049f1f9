//! Playwright browser automation
//!
//! A generated driver script runs under node for the lifetime of the
//! browser. It owns a single page and executes one JSON command per stdin
//! line, answering each with one JSON line on stdout.

use applab_common::config::BrowserConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::browser::Browser;
use crate::error::{BrowserError, BrowserResult};

const DRIVER_JS: &str = r#"
const { chromium, firefox, webkit } = require(require.resolve('playwright', { paths: [process.cwd()] }));
const readline = require('readline');

const ACTION_TIMEOUT = @ACTION_TIMEOUT@;

function reply(id, ok, payload) {
  const msg = ok
    ? { id, ok: true, value: payload === undefined ? null : payload }
    : { id, ok: false, error: String(payload) };
  process.stdout.write(JSON.stringify(msg) + '\n');
}

async function firstMatch(page, selector) {
  const loc = page.locator(selector).first();
  return (await loc.count()) === 0 ? null : loc;
}

async function handle(page, cmd) {
  switch (cmd.op) {
    case 'goto':
      await page.goto(cmd.url);
      return null;
    case 'click':
      await page.locator(cmd.selector).first().click({ timeout: ACTION_TIMEOUT });
      return null;
    case 'fill':
      await page.locator(cmd.selector).first().fill(cmd.value, { timeout: ACTION_TIMEOUT });
      return null;
    case 'select_option':
      await page.locator(cmd.selector).first().selectOption({ label: cmd.label }, { timeout: ACTION_TIMEOUT });
      return null;
    case 'is_visible':
      return await page.locator(cmd.selector).first().isVisible();
    case 'text': {
      const loc = await firstMatch(page, cmd.selector);
      return loc ? await loc.innerText({ timeout: ACTION_TIMEOUT }) : null;
    }
    case 'attribute': {
      const loc = await firstMatch(page, cmd.selector);
      return loc ? await loc.getAttribute(cmd.name, { timeout: ACTION_TIMEOUT }) : null;
    }
    case 'refresh':
      await page.reload();
      return null;
    default:
      throw new Error('unknown op ' + cmd.op);
  }
}

(async () => {
  const browser = await @BROWSER@.launch({ headless: @HEADLESS@ });
  const context = await browser.newContext({
    viewport: { width: @WIDTH@, height: @HEIGHT@ },
    ignoreHTTPSErrors: true,
  });
  const page = await context.newPage();
  reply(0, true, 'ready');

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (e) {
      process.stderr.write('bad command: ' + e.message + '\n');
      continue;
    }
    if (cmd.op === 'close') break;
    try {
      reply(cmd.id, true, await handle(page, cmd));
    } catch (e) {
      reply(cmd.id, false, e.message);
    }
  }
  await browser.close();
})().catch((e) => {
  process.stderr.write(String((e && e.stack) || e) + '\n');
  process.exit(1);
});
"#;

/// Render the driver script for `config`
pub fn driver_script(config: &BrowserConfig) -> String {
    DRIVER_JS
        .replace("@BROWSER@", config.kind.as_str())
        .replace("@HEADLESS@", if config.headless { "true" } else { "false" })
        .replace("@WIDTH@", &config.viewport_width.to_string())
        .replace("@HEIGHT@", &config.viewport_height.to_string())
        .replace("@ACTION_TIMEOUT@", &config.action_timeout_ms.to_string())
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Goto { url: &'a str },
    Click { selector: &'a str },
    Fill { selector: &'a str, value: &'a str },
    SelectOption { selector: &'a str, label: &'a str },
    IsVisible { selector: &'a str },
    Text { selector: &'a str },
    Attribute { selector: &'a str, name: &'a str },
    Refresh,
    Close,
}

impl DriverCommand<'_> {
    fn describe(&self) -> String {
        match self {
            DriverCommand::Goto { url } => format!("goto:{}", url),
            DriverCommand::Click { selector } => format!("click:{}", selector),
            DriverCommand::Fill { selector, .. } => format!("fill:{}", selector),
            DriverCommand::SelectOption { selector, label } => format!("select:{}={}", selector, label),
            DriverCommand::IsVisible { selector } => format!("is_visible:{}", selector),
            DriverCommand::Text { selector } => format!("text:{}", selector),
            DriverCommand::Attribute { selector, name } => format!("attribute:{}@{}", selector, name),
            DriverCommand::Refresh => "refresh".to_string(),
            DriverCommand::Close => "close".to_string(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A browser driven by a long-lived Playwright node process
pub struct PlaywrightBrowser {
    io: Mutex<DriverIo>,
    child: Option<Child>,
    next_id: AtomicU64,
    _script_dir: TempDir,
}

impl PlaywrightBrowser {
    /// Start the driver and wait until the page is ready
    pub async fn launch(config: &BrowserConfig) -> BrowserResult<Self> {
        Self::check_playwright_installed(&config.node_binary).await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        tokio::fs::write(&script_path, driver_script(config)).await?;

        info!("Launching {} (headless: {})", config.kind.as_str(), config.headless);

        let mut child = Command::new(&config.node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::Launch(format!("Failed to spawn {}: {}", config.node_binary.display(), e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BrowserError::Launch("driver stdio not captured".to_string()));
        };

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[playwright] {}", line);
                }
            });
        }

        let mut io = DriverIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let launch_timeout = Duration::from_secs(config.launch_timeout_secs);
        match tokio::time::timeout(launch_timeout, Self::read_reply(&mut io, 0)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BrowserError::Launch(e.to_string())),
            Err(_) => {
                return Err(BrowserError::Launch(format!(
                    "browser not ready after {}s",
                    config.launch_timeout_secs
                )))
            }
        }

        info!("Browser ready (pid: {:?})", child.id());
        Ok(Self {
            io: Mutex::new(io),
            child: Some(child),
            next_id: AtomicU64::new(1),
            _script_dir: script_dir,
        })
    }

    /// Check that node can resolve the playwright package
    async fn check_playwright_installed(node: &Path) -> BrowserResult<()> {
        let status = Command::new(node)
            .args(["-e", "require.resolve('playwright', { paths: [process.cwd()] })"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(BrowserError::NotInstalled),
        }
    }

    async fn read_reply(io: &mut DriverIo, id: u64) -> BrowserResult<Reply> {
        loop {
            let line = io.stdout.next_line().await?.ok_or(BrowserError::Closed)?;
            trace!("<- {}", line);
            match serde_json::from_str::<Reply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => warn!("Discarding stale driver reply {}", reply.id),
                Err(_) => debug!("[playwright] {}", line),
            }
        }
    }

    async fn execute(&self, command: DriverCommand<'_>) -> BrowserResult<Value> {
        let describe = command.describe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&Envelope { id, command })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        trace!("-> {}", line.trim_end());
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let reply = Self::read_reply(&mut io, id).await?;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(BrowserError::Script {
                command: describe,
                reason: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }

    /// Close the browser and wait for the driver to exit
    pub async fn close(mut self) -> BrowserResult<()> {
        {
            let mut io = self.io.lock().await;
            let line = serde_json::to_string(&Envelope {
                id: 0,
                command: DriverCommand::Close,
            })?;
            io.stdin.write_all(format!("{}\n", line).as_bytes()).await?;
            io.stdin.flush().await?;
        }

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
                Ok(status) => debug!("Browser driver exited: {:?}", status?),
                Err(_) => {
                    warn!("Browser driver did not exit, killing it");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for PlaywrightBrowser {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.execute(DriverCommand::Goto { url }).await.map(|_| ())
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.execute(DriverCommand::Click { selector }).await.map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> BrowserResult<()> {
        self.execute(DriverCommand::Fill { selector, value }).await.map(|_| ())
    }

    async fn select_option(&self, selector: &str, label: &str) -> BrowserResult<()> {
        self.execute(DriverCommand::SelectOption { selector, label })
            .await
            .map(|_| ())
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        let value = self.execute(DriverCommand::IsVisible { selector }).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text(&self, selector: &str) -> BrowserResult<Option<String>> {
        let value = self.execute(DriverCommand::Text { selector }).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn attribute(&self, selector: &str, name: &str) -> BrowserResult<Option<String>> {
        let value = self.execute(DriverCommand::Attribute { selector, name }).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn refresh(&self) -> BrowserResult<()> {
        self.execute(DriverCommand::Refresh).await.map(|_| ())
    }
}

impl Drop for PlaywrightBrowser {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            stop_driver(&mut child, DRIVER_GRACE);
        }
    }
}

/// How long the driver gets to exit after SIGTERM before it is killed
const DRIVER_GRACE: Duration = Duration::from_millis(500);

/// Stop a driver process, gracefully if it exits within `grace`.
///
/// Returns whether the process exited without being killed.
fn stop_driver(child: &mut Child, grace: Duration) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            debug!("Stopping browser driver (pid: {})", pid);
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                let deadline = std::time::Instant::now() + grace;
                while std::time::Instant::now() < deadline {
                    if let Ok(Some(_)) = child.try_wait() {
                        return true;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            }
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("Browser driver already gone: {}", e);
    }
    false
}
