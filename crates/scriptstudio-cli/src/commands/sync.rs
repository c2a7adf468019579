use scriptstudio_core::{PassOutcome, PassReport};

use crate::commands::common::{open_studio, Session};
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    let studio = open_studio(session).await?;
    let outcome = studio.processor().run_pass().await?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
        return Ok(());
    }

    match outcome {
        PassOutcome::Completed(report) => println!("{}", format_pass_report(&report)),
        PassOutcome::AlreadyRunning => println!("A sync pass is already running."),
        PassOutcome::Offline => println!("Offline; queued changes were kept."),
    }
    let remaining = studio.store().pending_count().await?;
    if remaining > 0 {
        println!("{remaining} change(s) still queued");
    }
    Ok(())
}

/// Run the background worker until Ctrl-C.
pub async fn run_sync_watch(session: &Session) -> Result<(), CliError> {
    let studio = open_studio(session).await?;
    let worker = studio.spawn_sync_worker();

    println!("Watching for changes to sync (Ctrl-C to stop)");
    tokio::signal::ctrl_c().await?;
    worker.abort();

    let remaining = studio.store().pending_count().await?;
    println!("Stopped; {remaining} change(s) still queued");
    Ok(())
}

pub fn format_pass_report(report: &PassReport) -> String {
    format!(
        "Sync completed: {} replayed, {} superseded, {} failed, {} skipped",
        report.replayed, report.superseded, report.failed, report.skipped
    )
}

fn outcome_json(outcome: PassOutcome) -> serde_json::Value {
    match outcome {
        PassOutcome::Completed(report) => serde_json::json!({
            "status": "completed",
            "report": report,
        }),
        PassOutcome::AlreadyRunning => serde_json::json!({ "status": "already_running" }),
        PassOutcome::Offline => serde_json::json!({ "status": "offline" }),
    }
}
