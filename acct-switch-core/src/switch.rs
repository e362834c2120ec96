//! Snapshot, switch and delete, composed from the backend, the registry
//! and the process controller.

use crate::backend::{CredentialBackend, KvStoreBackend, SecretStoreBackend, UNKNOWN_EMAIL};
use crate::config::{AppType, CoreConfig, SwitchSettings};
use crate::error::{CoreError, Result};
use crate::outcome::Outcome;
use crate::paths::PathResolver;
use crate::process::{
    AppStatus, LaunchMethod, ProcessController, ProcessOps, ProcessTarget, StatusMonitor,
    StopOutcome, StopPolicy, SystemProcessOps,
};
use crate::registry::{AccountIdentity, AccountRecord, AccountRegistry, RegistryFlavor};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub struct SwitchOrchestrator {
    app: AppType,
    backend: Box<dyn CredentialBackend>,
    registry: AccountRegistry,
    process: Option<ProcessController>,
    settings: SwitchSettings,
    op_lock: Mutex<()>,
}

impl SwitchOrchestrator {
    pub fn new(
        app: AppType,
        backend: Box<dyn CredentialBackend>,
        registry: AccountRegistry,
        process: Option<ProcessController>,
        settings: SwitchSettings,
    ) -> Self {
        Self {
            app,
            backend,
            registry,
            process,
            settings,
            op_lock: Mutex::new(()),
        }
    }

    /// Orchestrator for `app` on this machine.
    pub fn for_app(app: AppType, config: &CoreConfig) -> Self {
        let resolver = PathResolver::detect();
        let ops = Arc::new(SystemProcessOps::new(resolver.platform()));
        Self::with_resolver(app, config, resolver, ops)
    }

    /// Orchestrator for `app` using explicit paths and process primitives.
    pub fn with_resolver(
        app: AppType,
        config: &CoreConfig,
        resolver: PathResolver,
        ops: Arc<dyn ProcessOps>,
    ) -> Self {
        let app_dir = config.app_data_dir(app);
        match app {
            AppType::Antigravity => {
                let process = ProcessController::new(ProcessTarget::antigravity(&resolver), ops)
                    .with_policy(StopPolicy::from(&config.stop))
                    .with_prefer_uri(config.launch.prefer_uri);
                let flavor = RegistryFlavor::Uuid;
                Self::new(
                    app,
                    Box::new(KvStoreBackend::antigravity(resolver, config)),
                    AccountRegistry::open(app_dir.join(AccountRegistry::file_name(flavor)), flavor),
                    Some(process),
                    config.switch.clone(),
                )
            }
            AppType::Claude => {
                // Claude Code re-reads its state on every run; nothing to stop.
                let flavor = RegistryFlavor::Sequence;
                Self::new(
                    app,
                    Box::new(SecretStoreBackend::claude(resolver, config)),
                    AccountRegistry::open(app_dir.join(AccountRegistry::file_name(flavor)), flavor),
                    None,
                    config.switch.clone(),
                )
            }
        }
    }

    pub fn app(&self) -> AppType {
        self.app
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn process(&self) -> Option<&ProcessController> {
        self.process.as_ref()
    }

    pub fn with_process(mut self, process: Option<ProcessController>) -> Self {
        self.process = process;
        self
    }

    fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        self.op_lock
            .lock()
            .map_err(|_| CoreError::Message("another operation panicked".to_string()))
    }

    /// Capture the live state as an account and record it in the registry.
    /// Returns the account's id.
    pub fn snapshot_current(
        &self,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Outcome<String>> {
        let _op = self.begin()?;
        self.snapshot_unlocked(name, email)
    }

    fn snapshot_unlocked(&self, name: Option<&str>, email: Option<&str>) -> Result<Outcome<String>> {
        let detected = self.backend.detect_identity();
        let identity = match email {
            Some(email) => AccountIdentity {
                email: email.to_string(),
                account_uuid: detected
                    .filter(|d| d.email == email)
                    .and_then(|d| d.account_uuid),
            },
            None => detected.unwrap_or_else(|| AccountIdentity::new(UNKNOWN_EMAIL)),
        };
        log::info!("Backing up current account: {}", identity.email);

        let mut snapshot = self.backend.read_current().map_err(|e| {
            log::error!("Failed to read current state: {e}");
            e
        })?;
        snapshot.account_email = identity.email.clone();

        let backend = &self.backend;
        let result = self.registry.upsert(&identity, name, |id| {
            let location = backend.locate(id, &identity.email);
            backend.write_named(&location, &snapshot)?;
            Ok(location)
        })?;

        let mut warnings = Vec::new();
        if identity.is_unknown() {
            warnings.push("account email could not be detected".to_string());
        }
        log::info!(
            "{} account {} ({})",
            if result.created { "Saved new" } else { "Updated" },
            result.id,
            identity.email
        );
        Ok(Outcome::new(result.id, warnings))
    }

    /// Make account `id` the live account.
    ///
    /// Stop and restart problems are warnings; once the state has been
    /// written the switch stands.
    pub fn switch_to(&self, id: &str) -> Result<Outcome<AccountRecord>> {
        let _op = self.begin()?;

        let record = self
            .registry
            .get(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        if !self.backend.snapshot_exists(&record.snapshot) {
            return Err(CoreError::SnapshotMissing(format!(
                "snapshot for account {id} ({})",
                record.email
            )));
        }
        log::info!("Switching to account: {} ({})", record.name, record.email);

        let mut warnings = Vec::new();

        if self.settings.backs_up_before_switch(self.app) {
            match self.snapshot_unlocked(None, None) {
                Ok(outcome) => warnings.extend_from_slice(outcome.warnings()),
                Err(e) => {
                    log::warn!("Backup of current account before switch failed: {e}");
                    warnings.push(format!("backup before switch skipped: {e}"));
                }
            }
        }

        let snapshot = self.backend.read_named(&record.snapshot)?;

        if let Some(process) = &self.process {
            if let StopOutcome::Failed { remaining } = process.stop() {
                log::warn!(
                    "Could not close {}, restoring anyway",
                    self.app.display_name()
                );
                warnings.push(format!(
                    "{} processes still running during restore",
                    remaining.len()
                ));
            }
        }

        let written = self.backend.write_current(&snapshot).map_err(|e| {
            log::error!("Failed to restore account {id}: {e}");
            e
        })?;
        warnings.extend_from_slice(written.warnings());

        if let Err(e) = self
            .registry
            .set_active(id)
            .and_then(|_| self.registry.touch(id))
        {
            log::warn!("Failed to update registry after switch: {e}");
            warnings.push(format!("registry not updated: {e}"));
        }

        if self.settings.restart_after_switch {
            if let Some(process) = &self.process {
                match process.start() {
                    Ok(method) => log::debug!("Restarted with {method:?}"),
                    Err(e) => {
                        log::warn!("Failed to start {}: {e}", self.app.display_name());
                        warnings.push(format!("restart failed: {e}"));
                    }
                }
            }
        }

        log::info!("Switched to account {id}");
        let record = self.registry.get(id).unwrap_or(record);
        Ok(Outcome::new(record, warnings))
    }

    /// Remove account `id` and its archived snapshot.
    pub fn delete_account(&self, id: &str) -> Result<Outcome<AccountRecord>> {
        let _op = self.begin()?;

        let record = self
            .registry
            .get(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;

        let mut warnings = Vec::new();
        if let Err(e) = self.backend.remove_named(&record.snapshot) {
            log::warn!("Failed to remove snapshot of account {id}: {e}");
            warnings.push(format!("snapshot not fully removed: {e}"));
        }

        let record = self.registry.delete(id)?;
        Ok(Outcome::new(record, warnings))
    }

    pub fn list_accounts(&self) -> Vec<AccountRecord> {
        self.registry.list()
    }

    /// Resolve an exact id, else a 1-based listing index.
    pub fn resolve_id(&self, input: &str) -> Option<String> {
        let input = input.trim();
        let accounts = self.list_accounts();
        if let Some(record) = accounts.iter().find(|record| record.id == input) {
            return Some(record.id.clone());
        }
        let index = input.parse::<usize>().ok()?;
        (1..=accounts.len())
            .contains(&index)
            .then(|| accounts[index - 1].id.clone())
    }

    /// Email of the live account, if it can be detected.
    pub fn current_email(&self) -> Option<String> {
        self.backend.detect_identity().map(|identity| identity.email)
    }

    pub fn active_account(&self) -> Option<String> {
        self.registry.active()
    }

    pub fn supports_process_control(&self) -> bool {
        self.process.is_some()
    }

    /// `None` when the app has no process control.
    pub fn status(&self) -> Option<AppStatus> {
        self.process
            .as_ref()
            .map(|process| AppStatus::from_running(process.is_running()))
    }

    fn controller(&self) -> Result<&ProcessController> {
        self.process.as_ref().ok_or_else(|| {
            CoreError::Process(format!(
                "{} has no process control",
                self.app.display_name()
            ))
        })
    }

    pub fn stop_app(&self) -> Result<StopOutcome> {
        Ok(self.controller()?.stop())
    }

    pub fn start_app(&self) -> Result<LaunchMethod> {
        self.controller()?.start()
    }

    pub fn spawn_monitor(
        &self,
        interval: Duration,
        sink: Sender<AppStatus>,
    ) -> Result<StatusMonitor> {
        Ok(self.controller()?.spawn_monitor(interval, sink))
    }
}
