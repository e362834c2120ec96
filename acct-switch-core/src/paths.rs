//! Locating a managed application's files on the host.
//!
//! Lookups only check existence; "not found" is an empty list or `None`,
//! never an error. Callers decide what absence means.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Secret store service name for the live Claude Code credentials.
pub const CLAUDE_SECRET_SERVICE: &str = "Claude Code-credentials";

/// Resolves per-platform locations relative to an explicit home directory
/// and environment, so tests can point it at a temp dir.
#[derive(Debug, Clone)]
pub struct PathResolver {
    platform: Platform,
    home: PathBuf,
    env: HashMap<String, String>,
}

impl PathResolver {
    pub fn new(platform: Platform, home: PathBuf) -> Self {
        Self {
            platform,
            home,
            env: HashMap::new(),
        }
    }

    /// Resolver for the running host: real home dir and process environment.
    pub fn detect() -> Self {
        let mut resolver = Self::new(Platform::current(), dirs::home_dir().unwrap_or_default());
        for key in ["APPDATA", "LOCALAPPDATA", "ProgramFiles", "ProgramFiles(x86)"] {
            if let Ok(value) = std::env::var(key) {
                resolver.env.insert(key.to_string(), value);
            }
        }
        resolver
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn env_path(&self, key: &str) -> Option<PathBuf> {
        self.env.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    // --- Antigravity ---

    /// Every place the Antigravity state database may live, most specific first.
    pub fn antigravity_db_candidates(&self) -> Vec<PathBuf> {
        match self.platform {
            Platform::MacOs => {
                let support = self.home.join("Library/Application Support/Antigravity");
                vec![
                    support.join("User/globalStorage/state.vscdb"),
                    support.join("state.vscdb"),
                ]
            }
            Platform::Windows => match self.env_path("APPDATA") {
                Some(appdata) => {
                    let base = appdata.join("Antigravity");
                    vec![
                        base.join("User/globalStorage/state.vscdb"),
                        base.join("User/state.vscdb"),
                        base.join("state.vscdb"),
                    ]
                }
                None => Vec::new(),
            },
            Platform::Linux => {
                let base = self.home.join(".config/Antigravity");
                vec![
                    base.join("User/globalStorage/state.vscdb"),
                    base.join("state.vscdb"),
                ]
            }
            Platform::Other => Vec::new(),
        }
    }

    /// All existing store files, each followed by its `.backup` replica when
    /// present. Both copies must be written to stay consistent.
    pub fn antigravity_db_paths(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for candidate in self.antigravity_db_candidates() {
            if !candidate.is_file() {
                continue;
            }
            let replica = replica_path(&candidate);
            found.push(candidate);
            if replica.is_file() && !found.contains(&replica) {
                found.push(replica);
            }
        }
        found
    }

    pub fn antigravity_executable_candidates(&self) -> Vec<PathBuf> {
        match self.platform {
            Platform::MacOs => vec![PathBuf::from(
                "/Applications/Antigravity.app/Contents/MacOS/Antigravity",
            )],
            Platform::Windows => {
                let mut candidates = Vec::new();
                if let Some(local) = self.env_path("LOCALAPPDATA") {
                    candidates.push(local.join("Programs/Antigravity/Antigravity.exe"));
                }
                let program_files = self
                    .env_path("ProgramFiles")
                    .unwrap_or_else(|| PathBuf::from("C:\\Program Files"));
                let program_files_x86 = self
                    .env_path("ProgramFiles(x86)")
                    .unwrap_or_else(|| PathBuf::from("C:\\Program Files (x86)"));
                candidates.push(program_files.join("Antigravity/Antigravity.exe"));
                candidates.push(program_files_x86.join("Antigravity/Antigravity.exe"));
                candidates
            }
            Platform::Linux => vec![
                PathBuf::from("/usr/share/antigravity/antigravity"),
                PathBuf::from("/opt/Antigravity/antigravity"),
                self.home.join(".local/share/antigravity/antigravity"),
            ],
            Platform::Other => Vec::new(),
        }
    }

    /// First existing executable candidate.
    pub fn antigravity_executable(&self) -> Option<PathBuf> {
        self.antigravity_executable_candidates()
            .into_iter()
            .find(|p| p.is_file())
    }

    // --- Claude Code ---

    /// Existing live config: `~/.claude/.claude.json` when it carries an
    /// `oauthAccount`, otherwise `~/.claude.json` if present.
    pub fn claude_config_path(&self) -> Option<PathBuf> {
        let primary = self.home.join(".claude").join(".claude.json");
        if primary_has_identity(&primary) {
            return Some(primary);
        }
        let fallback = self.claude_config_fallback();
        fallback.is_file().then_some(fallback)
    }

    /// Where a live config is written when none exists yet.
    pub fn claude_config_fallback(&self) -> PathBuf {
        self.home.join(".claude.json")
    }

    /// Plain-file credential location used where no native secret store exists.
    pub fn claude_credentials_file(&self) -> PathBuf {
        self.home.join(".claude").join(".credentials.json")
    }
}

/// `state.vscdb` -> `state.vscdb.backup`
pub fn replica_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".backup");
    path.with_file_name(name)
}

fn primary_has_identity(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .map(|v| v.get("oauthAccount").is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn no_db_files_returns_empty() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(Platform::Linux, temp.path().to_path_buf());
        assert!(resolver.antigravity_db_paths().is_empty());
    }

    #[test]
    fn db_paths_include_existing_replica() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(Platform::Linux, temp.path().to_path_buf());
        let primary = temp.path().join(".config/Antigravity/User/globalStorage/state.vscdb");
        touch(&primary);
        touch(&replica_path(&primary));

        let paths = resolver.antigravity_db_paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], primary);
        assert!(paths[1].to_string_lossy().ends_with("state.vscdb.backup"));
    }

    #[test]
    fn all_existing_candidates_are_returned() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(Platform::MacOs, temp.path().to_path_buf());
        let support = temp.path().join("Library/Application Support/Antigravity");
        touch(&support.join("User/globalStorage/state.vscdb"));
        touch(&support.join("state.vscdb"));

        assert_eq!(resolver.antigravity_db_paths().len(), 2);
    }

    #[test]
    fn windows_without_appdata_has_no_candidates() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(Platform::Windows, temp.path().to_path_buf());
        assert!(resolver.antigravity_db_candidates().is_empty());

        let resolver = resolver.with_env("APPDATA", temp.path().to_string_lossy());
        assert_eq!(resolver.antigravity_db_candidates().len(), 3);
    }

    #[test]
    fn first_existing_executable_wins() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        let pf = temp.path().join("pf");
        let resolver = PathResolver::new(Platform::Windows, temp.path().to_path_buf())
            .with_env("LOCALAPPDATA", local.to_string_lossy())
            .with_env("ProgramFiles", pf.to_string_lossy());
        assert!(resolver.antigravity_executable().is_none());

        let exe = pf.join("Antigravity/Antigravity.exe");
        touch(&exe);
        assert_eq!(resolver.antigravity_executable(), Some(exe));
    }

    #[test]
    fn claude_config_prefers_primary_with_identity() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(Platform::Linux, temp.path().to_path_buf());
        assert!(resolver.claude_config_path().is_none());

        let fallback = temp.path().join(".claude.json");
        fs::write(&fallback, "{}").unwrap();
        assert_eq!(resolver.claude_config_path(), Some(fallback.clone()));

        let primary = temp.path().join(".claude/.claude.json");
        fs::create_dir_all(primary.parent().unwrap()).unwrap();
        fs::write(&primary, r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(resolver.claude_config_path(), Some(fallback));

        fs::write(&primary, r#"{"oauthAccount":{"emailAddress":"a@x.com"}}"#).unwrap();
        assert_eq!(resolver.claude_config_path(), Some(primary));
    }
}
