//! App process commands

use super::Context;
use acct_switch_core::{AppStatus, LaunchMethod, StopOutcome};
use anyhow::Result;
use std::sync::mpsc;
use std::time::Duration;

/// How often `status --watch` polls.
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

fn unsupported(ctx: &Context) {
    println!(
        "{} runs on demand; there is no process to control.",
        ctx.app.display_name()
    );
}

pub fn start(ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    if !orchestrator.supports_process_control() {
        unsupported(ctx);
        return Ok(());
    }

    let via = match orchestrator.start_app()? {
        LaunchMethod::Uri => "URI",
        LaunchMethod::Executable => "executable",
    };
    println!("✓ Started {} (via {})", ctx.app.display_name(), via);
    Ok(())
}

pub fn stop(ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    if !orchestrator.supports_process_control() {
        unsupported(ctx);
        return Ok(());
    }

    let name = ctx.app.display_name();
    match orchestrator.stop_app()? {
        StopOutcome::NotRunning => println!("{} is not running", name),
        StopOutcome::Stopped { .. } => println!("✓ Closed {}", name),
        StopOutcome::Failed { remaining } => {
            let list = remaining
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            anyhow::bail!("Failed to close {}: still running: {}", name, list);
        }
    }
    Ok(())
}

fn describe(status: AppStatus) -> &'static str {
    match status {
        AppStatus::Running => "running",
        AppStatus::Stopped => "not running",
    }
}

pub fn status(ctx: &Context, watch: bool) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let name = ctx.app.display_name();

    match orchestrator.status() {
        Some(status) => println!("{}: {}", name, describe(status)),
        None => println!("{}: no process control", name),
    }
    match orchestrator.current_email() {
        Some(email) => println!("Live account: {}", email),
        None => println!("Live account: unknown"),
    }
    if let Some(record) = orchestrator
        .active_account()
        .and_then(|id| orchestrator.registry().get(&id))
    {
        println!("Last switched to: {} ({})", record.name, record.id);
    }

    if !watch {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let _monitor = orchestrator.spawn_monitor(WATCH_INTERVAL, tx)?;
    println!("Watching {} (Ctrl+C to exit)...", name);
    for status in rx {
        println!(
            "[{}] {} is {}",
            chrono::Local::now().format("%H:%M:%S"),
            name,
            describe(status)
        );
    }
    Ok(())
}
