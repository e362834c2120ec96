pub mod account;
pub mod process;

use acct_switch_core::{AppType, CoreConfig, Outcome, SwitchOrchestrator};
use anyhow::Result;
use std::path::PathBuf;

/// Settings shared by every command.
pub struct Context {
    pub app: AppType,
    pub config: CoreConfig,
}

impl Context {
    pub fn new(app: &str, data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let app =
            AppType::from_str(app).ok_or_else(|| anyhow::anyhow!("Invalid app type: {}", app))?;

        let mut config = match config_path {
            Some(path) => CoreConfig::load_from(&path),
            None => CoreConfig::load(),
        };
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        log::debug!(
            "Managing {} with data dir {}",
            app.display_name(),
            config.data_dir.display()
        );

        Ok(Self { app, config })
    }

    pub fn orchestrator(&self) -> SwitchOrchestrator {
        SwitchOrchestrator::for_app(self.app, &self.config)
    }
}

/// Print the caveats of a partially successful operation.
pub fn print_warnings<T>(outcome: &Outcome<T>) {
    for warning in outcome.warnings() {
        eprintln!("  ⚠ {}", warning);
    }
}
