//! Application types, tool configuration and file helpers.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A managed application whose accounts can be switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppType {
    Antigravity,
    Claude,
}

impl AppType {
    pub fn as_str(&self) -> &str {
        match self {
            AppType::Antigravity => "antigravity",
            AppType::Claude => "claude",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "antigravity" => Some(AppType::Antigravity),
            "claude" => Some(AppType::Claude),
            _ => None,
        }
    }

    /// Human readable product name.
    pub fn display_name(&self) -> &str {
        match self {
            AppType::Antigravity => "Antigravity",
            AppType::Claude => "Claude Code",
        }
    }
}

pub fn get_app_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_default().join("acct-switch")
}

pub fn get_config_path() -> PathBuf {
    get_app_config_dir().join("config.toml")
}

pub fn get_default_data_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".acct-switch")
}

/// Process stop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopSettings {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub graceful_delay_ms: u64,
    pub final_wait_ms: u64,
    pub force_kill: bool,
}

impl Default for StopSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            poll_interval_ms: 500,
            graceful_delay_ms: 2000,
            final_wait_ms: 1000,
            force_kill: true,
        }
    }
}

impl StopSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn graceful_delay(&self) -> Duration {
        Duration::from_millis(self.graceful_delay_ms)
    }

    pub fn final_wait(&self) -> Duration {
        Duration::from_millis(self.final_wait_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Start through the app's URI handler before falling back to the executable.
    pub prefer_uri: bool,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self { prefer_uri: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSettings {
    /// Re-save the live account before switching away from it. Unset means
    /// the app's default, see [`SwitchSettings::backs_up_before_switch`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_before_switch: Option<bool>,
    pub restart_after_switch: bool,
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            backup_before_switch: None,
            restart_after_switch: true,
        }
    }
}

impl SwitchSettings {
    /// Claude Code rotates its refresh token, so an archive left untouched
    /// since the last switch goes stale. Its live account is re-saved
    /// unless configured otherwise.
    pub fn backs_up_before_switch(&self, app: AppType) -> bool {
        self.backup_before_switch
            .unwrap_or(matches!(app, AppType::Claude))
    }
}

/// Tool configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub stop: StopSettings,
    pub launch: LaunchSettings,
    pub switch: SwitchSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: get_default_data_dir(),
            stop: StopSettings::default(),
            launch: LaunchSettings::default(),
            switch: SwitchSettings::default(),
        }
    }
}

impl CoreConfig {
    /// Load from the default location.
    pub fn load() -> Self {
        Self::load_from(&get_config_path())
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is
    /// logged and also yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Failed to read config {}: {e}, using defaults", path.display());
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Malformed config {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Data directory for one managed app.
    pub fn app_data_dir(&self, app: AppType) -> PathBuf {
        self.data_dir.join(app.as_str())
    }
}

/// Write via a temp file in the same directory, then rename over `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    write_via_temp(path, data, false)
}

pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

/// Write a file readable only by its owner. The temp file is created
/// owner-only; permissions are re-applied after the rename as well.
pub fn write_private_file(path: &Path, data: &[u8]) -> Result<()> {
    write_via_temp(path, data, true)?;
    set_private_file_permissions(path)
}

fn write_via_temp(path: &Path, data: &[u8], private: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| CoreError::Config(format!("Invalid file path: {}", path.display())))?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let written = create_temp(&tmp, private).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path).map_err(CoreError::from)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Create a fresh temp file. A stale one would keep its old mode.
fn create_temp(tmp: &Path, private: bool) -> Result<File> {
    let _ = fs::remove_file(tmp);
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;
    Ok(options.open(tmp)?)
}

/// Create `dir` (and parents) with owner-only access.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

pub fn set_private_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = CoreConfig::load_from(&temp.path().join("absent.toml"));
        assert_eq!(config.stop, StopSettings::default());
        assert!(config.switch.restart_after_switch);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[stop]\ntimeout_secs = 3\nforce_kill = false\n").unwrap();

        let config = CoreConfig::load_from(&path);
        assert_eq!(config.stop.timeout_secs, 3);
        assert!(!config.stop.force_kill);
        assert_eq!(config.stop.poll_interval_ms, 500);
        assert!(config.launch.prefer_uri);
    }

    #[test]
    fn malformed_config_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "stop = [[[").unwrap();

        let config = CoreConfig::load_from(&path);
        assert_eq!(config.stop, StopSettings::default());
    }

    #[test]
    fn backup_before_switch_defaults_per_app() {
        let mut settings = SwitchSettings::default();
        assert!(settings.backs_up_before_switch(AppType::Claude));
        assert!(!settings.backs_up_before_switch(AppType::Antigravity));

        settings.backup_before_switch = Some(false);
        assert!(!settings.backs_up_before_switch(AppType::Claude));
        settings.backup_before_switch = Some(true);
        assert!(settings.backs_up_before_switch(AppType::Antigravity));
    }

    #[test]
    fn backup_before_switch_reads_from_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[switch]\nbackup_before_switch = false\n").unwrap();

        let config = CoreConfig::load_from(&path);
        assert_eq!(config.switch.backup_before_switch, Some(false));
        assert!(!config.switch.backs_up_before_switch(AppType::Claude));
    }

    #[cfg(unix)]
    #[test]
    fn stale_temp_file_does_not_leak_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let tmp = temp.path().join(".token.json.tmp");
        fs::write(&tmp, b"old").unwrap();
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644)).unwrap();

        let file = create_temp(&tmp, true).unwrap();
        let mode = file.metadata().unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read(&tmp).unwrap(), b"");
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        fs::write(&path, b"old").unwrap();
        fs::create_dir(temp.path().join(".token.json.tmp")).unwrap();

        assert!(write_private_file(&path, b"new").is_err());
        assert_eq!(fs::read(&path).unwrap(), b"old");
    }

    #[cfg(unix)]
    #[test]
    fn private_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("secrets");
        ensure_private_dir(&dir).unwrap();
        let file = dir.join("token.json");
        write_private_file(&file, b"{}").unwrap();

        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let file_mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }
}
