//! Real process operations backed by `sysinfo` and platform commands.

use super::{LaunchCommand, ProcessInfo, ProcessOps, ProcessTarget};
use crate::error::{CoreError, Result};
use crate::paths::Platform;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{
    Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System, UpdateKind,
};

/// Upper bound for helper commands (`osascript`, `taskkill`, `open`).
const HELPER_TIMEOUT: Duration = Duration::from_secs(3);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub struct SystemProcessOps {
    platform: Platform,
    system: Mutex<System>,
}

impl SystemProcessOps {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            system: Mutex::new(System::new()),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        let mut guard = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn signal(&self, pid: u32, signal: Signal) -> bool {
        self.with_system(|sys| {
            let pid = Pid::from_u32(pid);
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing(),
            );
            match sys.process(pid) {
                Some(process) => process.kill_with(signal).unwrap_or_else(|| process.kill()),
                None => false,
            }
        })
    }
}

fn hidden(program: impl AsRef<std::ffi::OsStr>) -> Command {
    #[allow(unused_mut)]
    let mut command = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// Run `command` to completion, killing it after `timeout`.
fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ExitStatus> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CoreError::Process(format!("Failed to run {command:?}: {e}")))?;

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CoreError::Process(format!(
                "{command:?} did not finish within {}s",
                timeout.as_secs()
            )));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

impl ProcessOps for SystemProcessOps {
    fn list(&self) -> Vec<ProcessInfo> {
        self.with_system(|sys| {
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
            );
            sys.processes()
                .iter()
                .filter(|(_, process)| !matches!(process.status(), ProcessStatus::Zombie))
                .map(|(pid, process)| ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().to_string(),
                    exe: process.exe().map(|p| p.to_path_buf()),
                })
                .collect()
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.with_system(|sys| {
            let pid = Pid::from_u32(pid);
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing(),
            );
            sys.process(pid)
                .map(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
                .unwrap_or(false)
        })
    }

    fn request_quit(&self, target: &ProcessTarget) -> Result<bool> {
        let command = match self.platform {
            Platform::MacOs => {
                let mut command = hidden("osascript");
                command.args([
                    "-e",
                    &format!("tell application \"{}\" to quit", target.app_name),
                ]);
                command
            }
            Platform::Windows => {
                let mut command = hidden("taskkill");
                command.args(["/IM", &target.image_name, "/T"]);
                command
            }
            Platform::Linux | Platform::Other => return Ok(false),
        };
        let status = run_with_timeout(command, HELPER_TIMEOUT)?;
        Ok(status.success())
    }

    fn terminate(&self, pid: u32) -> bool {
        self.signal(pid, Signal::Term)
    }

    fn kill(&self, pid: u32) -> bool {
        self.signal(pid, Signal::Kill)
    }

    fn open_uri(&self, uri: &str) -> Result<bool> {
        let mut command = match self.platform {
            Platform::MacOs => hidden("open"),
            Platform::Windows => {
                let mut command = hidden("cmd");
                command.args(["/c", "start", ""]);
                command
            }
            Platform::Linux | Platform::Other => hidden("xdg-open"),
        };
        command.arg(uri);
        let status = run_with_timeout(command, HELPER_TIMEOUT)?;
        Ok(status.success())
    }

    fn launch(&self, launch: &LaunchCommand) -> Result<()> {
        hidden(&launch.program)
            .args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CoreError::Process(format!(
                    "Failed to launch {}: {e}",
                    launch.program.display()
                ))
            })?;
        Ok(())
    }
}
