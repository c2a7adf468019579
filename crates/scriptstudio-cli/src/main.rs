//! ScriptStudio CLI - inspect and edit records from the terminal
//!
//! Every command works offline; queued changes are replayed by `studio sync`.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_db_path, Session};
use crate::commands::completions::run_completions;
use crate::commands::create::run_create;
use crate::commands::delete::run_delete;
use crate::commands::get::run_get;
use crate::commands::list::run_list;
use crate::commands::queue::{run_queue, run_retry_failed};
use crate::commands::sync::{run_sync, run_sync_watch};
use crate::commands::update::run_update;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "scriptstudio=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = Session {
        db_path: resolve_db_path(cli.db_path),
        config_path: cli.config,
        offline: cli.offline,
        json: cli.json,
    };

    match cli.command {
        Commands::Create { collection, fields } => {
            run_create(collection, &fields, &session).await?;
        }
        Commands::List {
            collection,
            sort,
            limit,
        } => run_list(collection, &sort, limit, &session).await?,
        Commands::Get { collection, id } => run_get(collection, &id, &session).await?,
        Commands::Update {
            collection,
            id,
            fields,
        } => run_update(collection, &id, &fields, &session).await?,
        Commands::Delete { collection, id } => run_delete(collection, &id, &session).await?,
        Commands::Sync { watch: false } => run_sync(&session).await?,
        Commands::Sync { watch: true } => run_sync_watch(&session).await?,
        Commands::Queue => run_queue(&session).await?,
        Commands::RetryFailed => run_retry_failed(&session).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
