//! Managed application process control
//!
//! ```text
//! discover ──none──> NotRunning
//!    │
//!    └─> graceful quit request ─> wait ─> recheck ──none──> Stopped(Graceful)
//!                                            │
//!                                            └─> SIGTERM ─> poll until timeout ──none──> Stopped(Terminate)
//!                                                                │
//!                                        force-kill disabled <───┴─> SIGKILL ─> wait ──none──> Stopped(Kill)
//!                                                 │                                 │
//!                                                 └──────────> Failed <─────────────┘
//! ```

mod matcher;
mod monitor;
mod system;

pub use matcher::{LaunchCommand, ProcessMatcher, ProcessTarget};
pub use monitor::{AppStatus, StatusMonitor};
pub use system::SystemProcessOps;

use crate::config::StopSettings;
use crate::error::{CoreError, Result};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A live OS process. The pid is only meaningful until the process exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

impl std::fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// OS-level process primitives the controller is built on.
pub trait ProcessOps: Send + Sync {
    fn list(&self) -> Vec<ProcessInfo>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the application to quit through the platform's native mechanism.
    /// `Ok(false)` means no request was sent.
    fn request_quit(&self, target: &ProcessTarget) -> Result<bool>;

    /// Polite termination signal. Returns whether it was delivered.
    fn terminate(&self, pid: u32) -> bool;

    fn kill(&self, pid: u32) -> bool;

    /// Activate a URI through the desktop. `Ok(false)` means the opener ran
    /// and reported failure.
    fn open_uri(&self, uri: &str) -> Result<bool>;

    fn launch(&self, command: &LaunchCommand) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub graceful_delay: Duration,
    pub final_wait: Duration,
    pub force_kill: bool,
}

impl From<&StopSettings> for StopPolicy {
    fn from(settings: &StopSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            poll_interval: settings.poll_interval(),
            graceful_delay: settings.graceful_delay(),
            final_wait: settings.final_wait(),
            force_kill: settings.force_kill,
        }
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::from(&StopSettings::default())
    }
}

/// Stage that finished the application off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    Graceful,
    Terminate,
    Kill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped { stage: StopStage },
    Failed { remaining: Vec<ProcessInfo> },
}

impl StopOutcome {
    /// `true` when no matching process is left.
    pub fn is_stopped(&self) -> bool {
        !matches!(self, StopOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMethod {
    Uri,
    Executable,
}

#[derive(Clone)]
pub struct ProcessController {
    target: ProcessTarget,
    matcher: ProcessMatcher,
    ops: Arc<dyn ProcessOps>,
    policy: StopPolicy,
    prefer_uri: bool,
}

impl ProcessController {
    pub fn new(target: ProcessTarget, ops: Arc<dyn ProcessOps>) -> Self {
        let matcher = ProcessMatcher::new(&target);
        Self {
            target,
            matcher,
            ops,
            policy: StopPolicy::default(),
            prefer_uri: true,
        }
    }

    pub fn with_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prefer_uri(mut self, prefer_uri: bool) -> Self {
        self.prefer_uri = prefer_uri;
        self
    }

    pub fn with_matcher(mut self, matcher: ProcessMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn target(&self) -> &ProcessTarget {
        &self.target
    }

    pub fn policy(&self) -> &StopPolicy {
        &self.policy
    }

    pub fn discover(&self) -> Vec<ProcessInfo> {
        self.ops
            .list()
            .into_iter()
            .filter(|p| self.matcher.matches(p))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        !self.discover().is_empty()
    }

    fn still_alive(&self, processes: &[ProcessInfo]) -> Vec<ProcessInfo> {
        processes
            .iter()
            .filter(|p| self.ops.is_alive(p.pid))
            .cloned()
            .collect()
    }

    fn describe(processes: &[ProcessInfo]) -> String {
        processes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Stop every matching process with the configured policy.
    pub fn stop(&self) -> StopOutcome {
        self.stop_with(&self.policy)
    }

    pub fn stop_with(&self, policy: &StopPolicy) -> StopOutcome {
        let app = &self.target.app_name;
        log::info!("Attempting to close {app}...");

        let found = self.discover();
        if found.is_empty() {
            log::info!("{app} is not running");
            return StopOutcome::NotRunning;
        }
        for process in &found {
            log::info!(
                "Found target process: {process} - {}",
                process
                    .exe
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }

        match self.ops.request_quit(&self.target) {
            Ok(true) => {
                log::info!("Exit request sent, waiting for {app} to respond...");
                thread::sleep(policy.graceful_delay);
            }
            Ok(false) => log::debug!("No graceful quit mechanism on this platform"),
            Err(e) => log::warn!("Graceful exit request failed: {e}, trying other methods"),
        }

        let remaining = self.discover();
        if remaining.is_empty() {
            log::info!("All {app} processes closed normally");
            return StopOutcome::Stopped {
                stage: StopStage::Graceful,
            };
        }

        log::info!(
            "{} processes still running, sending termination signal",
            remaining.len()
        );
        for process in &remaining {
            if !self.ops.terminate(process.pid) {
                log::debug!("Termination signal not delivered to {process}");
            }
        }

        log::info!(
            "Waiting for process exit (max {}s)...",
            policy.timeout.as_secs_f32()
        );
        let started = Instant::now();
        let mut still_running = remaining;
        loop {
            still_running = self.still_alive(&still_running);
            if still_running.is_empty() {
                log::info!("All {app} processes closed normally");
                return StopOutcome::Stopped {
                    stage: StopStage::Terminate,
                };
            }
            if started.elapsed() >= policy.timeout {
                break;
            }
            thread::sleep(policy.poll_interval);
        }

        log::warn!(
            "Still have {} processes running: {}",
            still_running.len(),
            Self::describe(&still_running)
        );
        if !policy.force_kill {
            log::error!("Some processes failed to close, close them manually and retry");
            return StopOutcome::Failed {
                remaining: still_running,
            };
        }

        log::info!("Sending force kill signal...");
        for process in &still_running {
            self.ops.kill(process.pid);
        }
        thread::sleep(policy.final_wait);

        let final_check = self.still_alive(&still_running);
        if final_check.is_empty() {
            log::info!("All {app} processes have been terminated");
            StopOutcome::Stopped {
                stage: StopStage::Kill,
            }
        } else {
            log::error!(
                "Processes unable to terminate: {}",
                Self::describe(&final_check)
            );
            StopOutcome::Failed {
                remaining: final_check,
            }
        }
    }

    /// Start the application, preferring URI activation.
    pub fn start(&self) -> Result<LaunchMethod> {
        let app = &self.target.app_name;
        log::info!("Starting {app}...");

        if self.prefer_uri {
            if let Some(uri) = &self.target.uri {
                match self.ops.open_uri(uri) {
                    Ok(true) => {
                        log::info!("{app} URI start command sent");
                        return Ok(LaunchMethod::Uri);
                    }
                    Ok(false) => log::warn!("URI start failed, trying executable path..."),
                    Err(e) => {
                        log::warn!("URI start error: {e}, retrying with executable path...")
                    }
                }
            }
        }

        self.launch_executable()
    }

    fn launch_executable(&self) -> Result<LaunchMethod> {
        let app = &self.target.app_name;
        let command = self
            .target
            .launch
            .as_ref()
            .ok_or_else(|| CoreError::Process(format!("{app} executable not found")))?;
        log::info!("Starting using executable path: {}", command.program.display());
        self.ops.launch(command)?;
        log::info!("{app} start command sent");
        Ok(LaunchMethod::Executable)
    }

    /// Poll [`is_running`](Self::is_running) on a background thread and
    /// post changes to `sink`.
    pub fn spawn_monitor(&self, interval: Duration, sink: Sender<AppStatus>) -> StatusMonitor {
        let controller = self.clone();
        StatusMonitor::spawn(interval, move || controller.is_running(), sink)
    }
}
