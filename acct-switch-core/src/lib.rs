//! Account Switch Core Library
//!
//! Backs up and swaps the signed-in account of locally installed apps:
//! credential backends, the account registry, process control and the
//! switch orchestration tying them together. Used by the CLI.

pub mod backend;
pub mod config;
pub mod error;
pub mod outcome;
pub mod paths;
pub mod process;
pub mod registry;
pub mod switch;

// Re-export commonly used types
pub use backend::{CredentialBackend, Snapshot, SnapshotLocation, UNKNOWN_EMAIL};
pub use config::{get_app_config_dir, AppType, CoreConfig};
pub use error::{CoreError, Result};
pub use outcome::Outcome;
pub use paths::{PathResolver, Platform};
pub use process::{AppStatus, LaunchMethod, ProcessController, StopOutcome};
pub use registry::{AccountIdentity, AccountRecord, AccountRegistry};
pub use switch::SwitchOrchestrator;
