//! Which processes belong to the managed application.

use super::ProcessInfo;
use crate::paths::{PathResolver, Platform};
use std::path::{Path, PathBuf};

/// How to start the application when URI activation is not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Everything the controller needs to know about one managed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTarget {
    pub platform: Platform,
    /// Application name as the OS shows it (`Antigravity`).
    pub app_name: String,
    /// Lowercase token matched against process names and paths.
    pub identifier: String,
    /// Windows image name used for the graceful quit request.
    pub image_name: String,
    pub uri: Option<String>,
    pub launch: Option<LaunchCommand>,
}

impl ProcessTarget {
    pub fn antigravity(resolver: &PathResolver) -> Self {
        let platform = resolver.platform();
        let launch = match platform {
            Platform::MacOs => Some(LaunchCommand::new("open").arg("-a").arg("Antigravity")),
            Platform::Windows => resolver.antigravity_executable().map(LaunchCommand::new),
            Platform::Linux | Platform::Other => Some(
                resolver
                    .antigravity_executable()
                    .map(LaunchCommand::new)
                    .unwrap_or_else(|| LaunchCommand::new("antigravity")),
            ),
        };

        Self {
            platform,
            app_name: "Antigravity".to_string(),
            identifier: "antigravity".to_string(),
            image_name: "Antigravity.exe".to_string(),
            uri: Some("antigravity://oauth-success".to_string()),
            launch,
        }
    }
}

/// Matches processes of a [`ProcessTarget`], never the caller itself or
/// anything installed next to it.
#[derive(Debug, Clone)]
pub struct ProcessMatcher {
    platform: Platform,
    identifier: String,
    own_pid: u32,
    own_dir: Option<PathBuf>,
}

impl ProcessMatcher {
    pub fn new(target: &ProcessTarget) -> Self {
        let own_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            platform: target.platform,
            identifier: target.identifier.to_lowercase(),
            own_pid: std::process::id(),
            own_dir: own_dir.map(|dir| lowercase_path(&dir)),
        }
    }

    /// Replace the exclusions taken from the current process.
    pub fn with_exclusions(mut self, own_pid: u32, own_dir: Option<&Path>) -> Self {
        self.own_pid = own_pid;
        self.own_dir = own_dir.map(lowercase_path);
        self
    }

    pub fn matches(&self, process: &ProcessInfo) -> bool {
        !self.is_excluded(process) && self.is_target(process)
    }

    fn is_excluded(&self, process: &ProcessInfo) -> bool {
        if process.pid == self.own_pid {
            return true;
        }
        match (&self.own_dir, &process.exe) {
            (Some(dir), Some(exe)) => lowercase_path(exe).starts_with(dir),
            _ => false,
        }
    }

    fn is_target(&self, process: &ProcessInfo) -> bool {
        let name = process.name.to_lowercase();
        let exe = process
            .exe
            .as_ref()
            .map(|p| p.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let id = self.identifier.as_str();

        match self.platform {
            Platform::MacOs => exe.contains(&format!("{id}.app")),
            Platform::Windows => {
                name == format!("{id}.exe")
                    || name == id
                    || (exe.contains(id) && !name.contains("manager"))
            }
            Platform::Linux | Platform::Other => name == id || exe.contains(id),
        }
    }
}

fn lowercase_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(platform: Platform) -> ProcessTarget {
        let resolver = PathResolver::new(platform, PathBuf::from("/home/u"));
        ProcessTarget::antigravity(&resolver)
    }

    fn proc(pid: u32, name: &str, exe: Option<&str>) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            exe: exe.map(PathBuf::from),
        }
    }

    #[test]
    fn macos_matches_bundle_path_only() {
        let matcher = ProcessMatcher::new(&target(Platform::MacOs)).with_exclusions(1, None);
        assert!(matcher.matches(&proc(
            10,
            "Electron",
            Some("/Applications/Antigravity.app/Contents/MacOS/Electron")
        )));
        assert!(!matcher.matches(&proc(11, "antigravity", Some("/usr/bin/antigravity"))));
    }

    #[test]
    fn windows_skips_manager_tools() {
        let matcher = ProcessMatcher::new(&target(Platform::Windows)).with_exclusions(1, None);
        assert!(matcher.matches(&proc(10, "Antigravity.exe", None)));
        assert!(matcher.matches(&proc(
            11,
            "helper.exe",
            Some("C:\\Programs\\Antigravity\\helper.exe")
        )));
        assert!(!matcher.matches(&proc(
            12,
            "AI Tools Manager.exe",
            Some("C:\\Tools\\antigravity-manager\\AI Tools Manager.exe")
        )));
    }

    #[test]
    fn linux_matches_name_or_path() {
        let matcher = ProcessMatcher::new(&target(Platform::Linux)).with_exclusions(1, None);
        assert!(matcher.matches(&proc(10, "antigravity", None)));
        assert!(matcher.matches(&proc(11, "electron", Some("/opt/Antigravity/electron"))));
        assert!(!matcher.matches(&proc(12, "code", Some("/usr/share/code/code"))));
    }

    #[test]
    fn linux_fallback_launch_is_bare_command() {
        let t = target(Platform::Linux);
        assert_eq!(t.launch, Some(LaunchCommand::new("antigravity")));
    }
}
