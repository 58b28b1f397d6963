//! OpenClaw process detection and lifecycle management
//!
//! Detects whether the local OpenClaw gateway is already listening, starts it as a
//! child process when it is not, and polls health until it is ready. The launcher
//! only ever terminates a process it started itself; a gateway found already
//! running belongs to someone else.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use url::Url;

/// Gateway port used when the configured URL does not name one
const DEFAULT_PORT: u16 = 18789;

/// Executable name resolved from PATH
#[cfg(not(windows))]
const EXECUTABLE: &str = "openclaw";
#[cfg(windows)]
const EXECUTABLE: &str = "openclaw.exe";

/// Timeout for a single health probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a freshly launched gateway gets to become healthy
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between health probes while waiting for readiness
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Grace period between SIGTERM and SIGKILL
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of the managed gateway process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// No launch attempted yet
    NotStarted,
    /// Process spawned, waiting for a healthy probe
    Starting,
    /// A health probe succeeded before the start timeout
    Ready,
    /// Executable missing, spawn failed, early exit, or start timeout
    Failed,
    /// Explicitly terminated by the bridge
    Terminated,
}

impl std::fmt::Display for LaunchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchState::NotStarted => write!(f, "not started"),
            LaunchState::Starting => write!(f, "starting"),
            LaunchState::Ready => write!(f, "ready"),
            LaunchState::Failed => write!(f, "failed"),
            LaunchState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Default location for captured gateway stderr
fn default_stderr_log() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("openclaw-bridge")
        .join("logs")
        .join("openclaw-stderr.log")
}

/// Detects, starts, health-polls, and terminates the local OpenClaw gateway.
pub struct OpenClawLauncher {
    url: String,
    start_timeout: Duration,
    poll_interval: Duration,
    state: LaunchState,
    process: Option<Child>,
    /// True only while this launcher owns a process it spawned itself.
    /// Termination is decided by this flag, never by handle presence.
    owned: bool,
    stderr_path: PathBuf,
    client: reqwest::Client,
}

impl OpenClawLauncher {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            start_timeout: START_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            state: LaunchState::NotStarted,
            process: None,
            owned: false,
            stderr_path: default_stderr_log(),
            client: reqwest::Client::new(),
        }
    }

    /// Override start timeout and poll interval
    pub fn with_timeouts(mut self, start_timeout: Duration, poll_interval: Duration) -> Self {
        self.start_timeout = start_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Override where gateway stderr is captured
    pub fn with_stderr_log(mut self, path: PathBuf) -> Self {
        self.stderr_path = path;
        self
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// Locate the gateway binary on PATH
    pub fn find_executable() -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(EXECUTABLE))
            .find(|candidate| candidate.is_file())
    }

    /// True iff the gateway answers `GET /v1/models` with HTTP 200, regardless of
    /// who started it
    pub async fn is_running(&self) -> bool {
        let url = format!("{}/v1/models", self.url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Return true if the gateway is already running or was started successfully.
    pub async fn ensure_running(&mut self) -> bool {
        if self.is_running().await {
            tracing::info!("OpenClaw is already running at {}", self.url);
            return true;
        }

        let started = self.start().await;

        // Race: another process may have brought the gateway up while ours was
        // still starting. The probe already confirmed readiness, so cede
        // ownership instead of treating the early exit as a failure.
        if started {
            if let Some(child) = self.process.as_mut() {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    tracing::info!("OpenClaw was started by another process");
                    self.process = None;
                    self.owned = false;
                }
            }
        }

        started
    }

    /// Start `openclaw gateway --port <port>` and poll until healthy or timeout.
    pub async fn start(&mut self) -> bool {
        let Some(exe) = Self::find_executable() else {
            tracing::error!("openclaw executable not found on PATH");
            self.state = LaunchState::Failed;
            return false;
        };

        let port = self.port();
        tracing::info!("Starting openclaw gateway on port {} ...", port);

        let stderr = match self.create_stderr_log() {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(
                    "Failed to open stderr log {}: {}",
                    self.stderr_path.display(),
                    e
                );
                self.state = LaunchState::Failed;
                return false;
            }
        };

        self.state = LaunchState::Starting;
        match Command::new(&exe)
            .arg("gateway")
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
        {
            Ok(child) => {
                self.process = Some(child);
                self.owned = true;
            }
            Err(e) => {
                tracing::error!("Failed to launch openclaw: {}", e);
                self.state = LaunchState::Failed;
                return false;
            }
        }

        self.wait_until_ready().await
    }

    /// Terminate the managed gateway process if this launcher started it.
    /// SIGTERM first, SIGKILL after the grace period. Idempotent.
    pub async fn terminate(&mut self) {
        if !self.owned {
            return;
        }
        let Some(mut child) = self.process.take() else {
            return;
        };
        self.owned = false;

        if matches!(child.try_wait(), Ok(Some(_))) {
            self.state = LaunchState::Terminated;
            return;
        }

        if let Some(pid) = child.id() {
            tracing::info!("Terminating managed OpenClaw process (pid={})", pid);
            #[cfg(unix)]
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
        }

        if timeout(TERM_GRACE, child.wait()).await.is_err() {
            tracing::warn!(
                "OpenClaw did not exit within {}s, killing",
                TERM_GRACE.as_secs()
            );
            let _ = child.kill().await;
        }
        self.state = LaunchState::Terminated;
    }

    /// Extract the gateway port from the configured URL
    fn port(&self) -> u16 {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.port())
            .unwrap_or(DEFAULT_PORT)
    }

    fn create_stderr_log(&self) -> std::io::Result<std::fs::File> {
        if let Some(parent) = self.stderr_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&self.stderr_path)
    }

    /// Poll the health endpoint until ready, early child exit, or timeout.
    async fn wait_until_ready(&mut self) -> bool {
        let deadline = Instant::now() + self.start_timeout;
        while Instant::now() < deadline {
            if let Some(child) = self.process.as_mut() {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::error!("openclaw process exited with {} before becoming ready", status);
                        self.surface_captured_stderr();
                        self.process = None;
                        self.owned = false;
                        self.state = LaunchState::Failed;
                        return false;
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Failed to poll openclaw process: {}", e),
                }
            }

            if self.is_running().await {
                tracing::info!("OpenClaw is ready at {}", self.url);
                self.state = LaunchState::Ready;
                return true;
            }

            sleep(self.poll_interval).await;
        }

        tracing::error!(
            "OpenClaw did not become ready within {}s",
            self.start_timeout.as_secs()
        );
        self.surface_captured_stderr();
        self.state = LaunchState::Failed;
        false
    }

    /// Log whatever the gateway wrote to stderr, for operator diagnosis
    fn surface_captured_stderr(&self) {
        if let Ok(output) = std::fs::read_to_string(&self.stderr_path) {
            let output = output.trim();
            if !output.is_empty() {
                tracing::error!("openclaw stderr:\n{}", output);
            }
        }
    }

    /// Path where gateway stderr is being captured
    pub fn stderr_log(&self) -> &Path {
        &self.stderr_path
    }
}
