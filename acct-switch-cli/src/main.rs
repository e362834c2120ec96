use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "acct-switch")]
#[command(author, version, about = "Back up and switch accounts of desktop AI tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Managed app: antigravity or claude
    #[arg(short, long, default_value = "antigravity", global = true)]
    app: String,

    /// Directory holding saved accounts
    #[arg(long, env = "ACCT_SWITCH_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/acct-switch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved accounts
    #[command(alias = "ls")]
    List {
        /// Output format: json (default is a table)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Save the currently signed-in account
    #[command(alias = "backup")]
    Add {
        /// Display name (default: derived from the email)
        #[arg(long)]
        name: Option<String>,

        /// Account email (default: detected from the app)
        #[arg(long)]
        email: Option<String>,
    },

    /// Switch to a saved account
    Switch {
        /// Account ID or list index
        id: String,

        /// Leave the app closed after switching
        #[arg(long)]
        no_restart: bool,
    },

    /// Delete a saved account
    #[command(alias = "rm")]
    Delete {
        /// Account ID or list index
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the app
    Start,

    /// Close the app
    Stop {
        /// Never force-kill processes that ignore the close request
        #[arg(long)]
        no_force: bool,
    },

    /// Show whether the app is running and which account is live
    Status {
        /// Keep watching and print every change
        #[arg(short, long)]
        watch: bool,
    },
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut ctx = commands::Context::new(&cli.app, cli.data_dir, cli.config)?;

    match cli.command {
        Some(Commands::List { format }) => commands::account::list(&ctx, format),
        Some(Commands::Add { name, email }) => commands::account::add(&ctx, name, email),
        Some(Commands::Switch { id, no_restart }) => {
            if no_restart {
                ctx.config.switch.restart_after_switch = false;
            }
            commands::account::switch(&ctx, &id)
        }
        Some(Commands::Delete { id, yes }) => commands::account::delete(&ctx, &id, yes),
        Some(Commands::Start) => commands::process::start(&ctx),
        Some(Commands::Stop { no_force }) => {
            if no_force {
                ctx.config.stop.force_kill = false;
            }
            commands::process::stop(&ctx)
        }
        Some(Commands::Status { watch }) => commands::process::status(&ctx, watch),
        None => commands::account::interactive_switch(&ctx),
    }
}
