use super::{print_warnings, Context};
use crate::output::{create_table, format_time, live_cell};
use acct_switch_core::{AccountRecord, SwitchOrchestrator};
use anyhow::Result;
use comfy_table::Cell;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};

/// Whether `record` is the account the app is signed in to right now.
fn is_live(record: &AccountRecord, current_email: Option<&str>, active: Option<&str>) -> bool {
    match current_email {
        Some(email) => record.email == email,
        None => active == Some(record.id.as_str()),
    }
}

fn resolve(orchestrator: &SwitchOrchestrator, input: &str) -> Result<String> {
    orchestrator
        .resolve_id(input)
        .ok_or_else(|| anyhow::anyhow!("Account not found: {}", input))
}

fn print_empty(ctx: &Context) {
    println!(
        "No accounts saved for {}. Use 'acct-switch add' to save the current one.",
        ctx.app.display_name()
    );
}

pub fn list(ctx: &Context, format: Option<String>) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let accounts = orchestrator.list_accounts();

    if format.as_deref() == Some("json") {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        print_empty(ctx);
        return Ok(());
    }

    let current = orchestrator.current_email();
    let active = orchestrator.active_account();

    let mut table = create_table(vec!["#", "Name", "Email", "ID", "Last Used", ""]);
    for (i, record) in accounts.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&record.name),
            Cell::new(&record.email),
            Cell::new(&record.id),
            Cell::new(format_time(&record.last_used_at)),
            live_cell(is_live(record, current.as_deref(), active.as_deref())),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn add(ctx: &Context, name: Option<String>, email: Option<String>) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let outcome = orchestrator.snapshot_current(name.as_deref(), email.as_deref())?;
    print_warnings(&outcome);

    let id = outcome.into_value();
    match orchestrator.registry().get(&id) {
        Some(record) => println!("✓ Saved account: {} <{}> ({})", record.name, record.email, id),
        None => println!("✓ Saved account: {}", id),
    }
    Ok(())
}

pub fn switch(ctx: &Context, input: &str) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let id = resolve(&orchestrator, input)?;
    run_switch(&orchestrator, &id)
}

fn run_switch(orchestrator: &SwitchOrchestrator, id: &str) -> Result<()> {
    let outcome = orchestrator.switch_to(id)?;
    print_warnings(&outcome);

    let record = outcome.value();
    println!("✓ Switched to account: {} <{}>", record.name, record.email);
    Ok(())
}

pub fn delete(ctx: &Context, input: &str, yes: bool) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let id = resolve(&orchestrator, input)?;
    let record = orchestrator
        .registry()
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Account not found: {}", input))?;

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete account '{}' <{}>?", record.name, record.email))
            .default(false)
            .interact_opt()
            .map_err(|e| {
                anyhow::anyhow!("Cannot ask for confirmation ({}). Pass --yes to delete.", e)
            })?;
        if confirmed != Some(true) {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let outcome = orchestrator.delete_account(&id)?;
    print_warnings(&outcome);
    println!("✓ Deleted account: {} ({})", record.name, id);
    Ok(())
}

/// Pick an account with the arrow keys and switch to it.
pub fn interactive_switch(ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let accounts = orchestrator.list_accounts();

    if accounts.is_empty() {
        print_empty(ctx);
        return Ok(());
    }

    let current = orchestrator.current_email();
    let active = orchestrator.active_account();
    let live: Vec<bool> = accounts
        .iter()
        .map(|r| is_live(r, current.as_deref(), active.as_deref()))
        .collect();

    let items: Vec<String> = accounts
        .iter()
        .zip(&live)
        .map(|(r, live)| {
            let marker = if *live { " ✓" } else { "" };
            format!("{} <{}>{}", r.name, r.email, marker)
        })
        .collect();
    let default = live.iter().position(|l| *l).unwrap_or(0);

    let selection = match Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Select {} account (↑↓ to move, Enter to switch, Esc to exit)",
            ctx.app.display_name()
        ))
        .items(&items)
        .default(default)
        .interact_opt()
    {
        Ok(Some(idx)) => idx,
        Ok(None) => return Ok(()),
        Err(e) => {
            // Not a terminal: show the accounts instead.
            eprintln!("Interactive mode not available: {}", e);
            for (i, item) in items.iter().enumerate() {
                println!("{}. {}", i + 1, item);
            }
            return Ok(());
        }
    };

    if live[selection] {
        println!("Already using: {}", accounts[selection].name);
        return Ok(());
    }
    run_switch(&orchestrator, &accounts[selection].id)
}
