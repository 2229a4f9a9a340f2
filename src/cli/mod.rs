pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use stats::{process_stats_command, StatsCommand};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    config::{Config, CONFIG_FILE},
    storage::{json_store::JsonFileStore, load_ledgers, save_ledgers},
    tracker::{signals::WorkspaceFolder, start_tracker, LEDGER_DIR},
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, SERVE_PREFIX},
    },
};

pub const LOG_DIR: &str = "logs";

#[derive(Parser, Debug)]
#[command(name = "timetrack", version, long_about = None)]
#[command(about = "Tracks active coding time per project, language and framework", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging to the console (stderr)")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Run the tracker for a host editor. Reads activity from stdin and writes status to stdout"
    )]
    Serve {
        #[arg(long, help = "Config file. Defaults to config.toml in the application directory")]
        config: Option<PathBuf>,
        #[arg(long, help = "Workspace folder open in the host. Can be repeated")]
        workspace: Vec<PathBuf>,
    },
    #[command(about = "Display recorded time")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Delete the recorded time of a project on one day")]
    Delete {
        #[arg(long)]
        project: String,
        #[arg(long, help = "Day in YYYY-MM-DD format")]
        date: String,
    },
    #[command(about = "Delete all recorded time")]
    Reset {
        #[arg(long, help = "Confirm deleting everything")]
        yes: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Serve { .. } => SERVE_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(
        prefix,
        &ensure_dir(app_dir.join(LOG_DIR))?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Serve { config, workspace } => {
            let config = Config::load(&config.unwrap_or_else(|| app_dir.join(CONFIG_FILE)))?;
            let folders = workspace
                .into_iter()
                .map(WorkspaceFolder::from_path)
                .collect();
            start_tracker(app_dir, config, folders).await
        }
        Commands::Stats { command } => process_stats_command(command, &app_dir).await,
        Commands::Delete { project, date } => delete_entry(&app_dir, &project, &date).await,
        Commands::Reset { yes } => reset_all(&app_dir, yes).await,
    }
}

/// Deleting offline is idempotent. A running `serve` keeps its own copy of the ledgers and will
/// write it back on its next persist.
async fn delete_entry(app_dir: &Path, project: &str, date: &str) -> Result<()> {
    let store = JsonFileStore::new(app_dir.join(LEDGER_DIR))?;
    let mut ledgers = load_ledgers(&store).await?;
    if ledgers.delete_entry(project, date) {
        save_ledgers(&store, &ledgers).await?;
        info!("Deleted {project} on {date}");
        println!("Deleted {project} on {date}");
    } else {
        println!("Nothing recorded for {project} on {date}");
    }
    Ok(())
}

async fn reset_all(app_dir: &Path, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("Refusing to delete all recorded time without --yes");
    }
    let store = JsonFileStore::new(app_dir.join(LEDGER_DIR))?;
    let mut ledgers = load_ledgers(&store).await?;
    ledgers.reset_all();
    save_ledgers(&store, &ledgers).await?;
    info!("Reset all recorded time");
    println!("All recorded time deleted");
    Ok(())
}
