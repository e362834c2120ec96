#![allow(dead_code)]

use acct_switch_core::config::StopSettings;
use acct_switch_core::process::{LaunchCommand, ProcessInfo, ProcessOps, ProcessTarget};
use acct_switch_core::{AppType, CoreConfig, CoreError, PathResolver, Platform, SwitchOrchestrator};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const AUTH_KEY: &str = "antigravityAuthStatus";
pub const INIT_KEY: &str = "jetskiStateSync.agentManagerInitState";

/// How a fake process reacts to being asked to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    OnQuitRequest,
    OnTerminate,
    OnKill,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriBehaviour {
    Opens,
    ReportsFailure,
    Errors,
}

#[derive(Debug)]
struct FakeState {
    processes: Vec<(ProcessInfo, Exit)>,
    quit_supported: bool,
    uri: UriBehaviour,
    quit_requests: usize,
    terminated: Vec<u32>,
    killed: Vec<u32>,
    opened: Vec<String>,
    launched: Vec<LaunchCommand>,
}

/// Scripted stand-in for the OS process table.
#[derive(Debug)]
pub struct FakeProcessOps {
    state: Mutex<FakeState>,
}

impl Default for FakeProcessOps {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState {
                processes: Vec::new(),
                quit_supported: false,
                uri: UriBehaviour::Opens,
                quit_requests: 0,
                terminated: Vec::new(),
                killed: Vec::new(),
                opened: Vec::new(),
                launched: Vec::new(),
            }),
        }
    }
}

impl FakeProcessOps {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_process(&self, pid: u32, name: &str, exe: Option<&Path>, exit: Exit) {
        let info = ProcessInfo {
            pid,
            name: name.to_string(),
            exe: exe.map(Path::to_path_buf),
        };
        self.state.lock().unwrap().processes.push((info, exit));
    }

    /// An Antigravity process as it appears on Linux.
    pub fn add_app(&self, pid: u32, exit: Exit) {
        self.add_process(
            pid,
            "antigravity",
            Some(Path::new("/opt/Antigravity/antigravity")),
            exit,
        );
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().processes.clear();
    }

    pub fn set_quit_supported(&self, supported: bool) {
        self.state.lock().unwrap().quit_supported = supported;
    }

    pub fn set_uri(&self, uri: UriBehaviour) {
        self.state.lock().unwrap().uri = uri;
    }

    pub fn quit_requests(&self) -> usize {
        self.state.lock().unwrap().quit_requests
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminated.clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn launched(&self) -> Vec<LaunchCommand> {
        self.state.lock().unwrap().launched.clone()
    }

    fn remove_where(&self, exits: &[Exit], pid: Option<u32>) {
        self.state.lock().unwrap().processes.retain(|(info, exit)| {
            let targeted = pid.map(|p| p == info.pid).unwrap_or(true);
            !(targeted && exits.contains(exit))
        });
    }
}

impl ProcessOps for FakeProcessOps {
    fn list(&self) -> Vec<ProcessInfo> {
        let state = self.state.lock().unwrap();
        state.processes.iter().map(|(info, _)| info.clone()).collect()
    }

    fn is_alive(&self, pid: u32) -> bool {
        let state = self.state.lock().unwrap();
        state.processes.iter().any(|(info, _)| info.pid == pid)
    }

    fn request_quit(&self, _target: &ProcessTarget) -> acct_switch_core::Result<bool> {
        let supported = {
            let mut state = self.state.lock().unwrap();
            state.quit_requests += 1;
            state.quit_supported
        };
        if supported {
            self.remove_where(&[Exit::OnQuitRequest], None);
        }
        Ok(supported)
    }

    fn terminate(&self, pid: u32) -> bool {
        self.state.lock().unwrap().terminated.push(pid);
        self.remove_where(&[Exit::OnQuitRequest, Exit::OnTerminate], Some(pid));
        true
    }

    fn kill(&self, pid: u32) -> bool {
        self.state.lock().unwrap().killed.push(pid);
        self.remove_where(
            &[Exit::OnQuitRequest, Exit::OnTerminate, Exit::OnKill],
            Some(pid),
        );
        true
    }

    fn open_uri(&self, uri: &str) -> acct_switch_core::Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.opened.push(uri.to_string());
        match state.uri {
            UriBehaviour::Opens => Ok(true),
            UriBehaviour::ReportsFailure => Ok(false),
            UriBehaviour::Errors => Err(CoreError::Process("no opener".to_string())),
        }
    }

    fn launch(&self, command: &LaunchCommand) -> acct_switch_core::Result<()> {
        self.state.lock().unwrap().launched.push(command.clone());
        Ok(())
    }
}

/// Stop settings that never make a test wait.
pub fn fast_stop(force_kill: bool) -> StopSettings {
    StopSettings {
        timeout_secs: 0,
        poll_interval_ms: 1,
        graceful_delay_ms: 0,
        final_wait_ms: 0,
        force_kill,
    }
}

/// Isolated home and data directories.
pub struct TestEnv {
    pub temp: TempDir,
    pub home: PathBuf,
    pub config: CoreConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let home = temp.path().join("home");
        fs::create_dir_all(&home).expect("Failed to create home");

        let mut config = CoreConfig::default();
        config.data_dir = temp.path().join("data");
        config.stop = fast_stop(true);

        Self { temp, home, config }
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(Platform::Linux, self.home.clone())
    }

    pub fn orchestrator(&self, app: AppType, ops: Arc<FakeProcessOps>) -> SwitchOrchestrator {
        SwitchOrchestrator::with_resolver(app, &self.config, self.resolver(), ops)
    }

    pub fn app_dir(&self, app: AppType) -> PathBuf {
        self.config.app_data_dir(app)
    }

    // --- Antigravity ---

    pub fn state_db(&self) -> PathBuf {
        self.home
            .join(".config/Antigravity/User/globalStorage/state.vscdb")
    }

    pub fn state_db_replica(&self) -> PathBuf {
        self.home
            .join(".config/Antigravity/User/globalStorage/state.vscdb.backup")
    }

    /// Live state for an account as the app would store it.
    pub fn set_live_account(&self, email: &str, token: &str) {
        set_live_account_at(&self.state_db(), email, token);
    }

    // --- Claude Code ---

    pub fn claude_config(&self) -> PathBuf {
        self.home.join(".claude.json")
    }

    pub fn claude_credentials(&self) -> PathBuf {
        self.home.join(".claude/.credentials.json")
    }

    pub fn set_claude_account(&self, email: &str, uuid: &str, theme: &str, token: &str) {
        let config = serde_json::json!({
            "theme": theme,
            "numStartups": 3,
            "oauthAccount": {"emailAddress": email, "accountUuid": uuid}
        });
        fs::write(
            self.claude_config(),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
        fs::create_dir_all(self.claude_credentials().parent().unwrap()).unwrap();
        fs::write(
            self.claude_credentials(),
            format!("{{\"claudeAiOauth\":{{\"accessToken\":\"{token}\"}}}}"),
        )
        .unwrap();
    }

    pub fn claude_live_config(&self) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(self.claude_config()).unwrap()).unwrap()
    }
}

pub fn auth_status(email: &str, token: &str) -> String {
    format!("{{\"email\":\"{email}\",\"apiKey\":\"{token}\"}}")
}

/// Create (if needed) a state database shaped like the app's.
pub fn create_state_db(path: &Path) -> Connection {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).expect("Failed to open state db");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
        [],
    )
    .unwrap();
    conn
}

pub fn put_item(path: &Path, key: &str, value: &str) {
    let conn = create_state_db(path);
    conn.execute(
        "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .unwrap();
}

pub fn get_item(path: &Path, key: &str) -> Option<String> {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT value FROM ItemTable WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .unwrap()
}

pub fn set_live_account_at(path: &Path, email: &str, token: &str) {
    put_item(path, AUTH_KEY, &auth_status(email, token));
    put_item(path, INIT_KEY, &format!("init-{token}"));
}
