use scriptstudio_core::models::QueueEntry;

use crate::commands::common::{format_timestamp, open_studio, Session};
use crate::error::CliError;

pub async fn run_queue(session: &Session) -> Result<(), CliError> {
    let studio = open_studio(session).await?;
    let entries = studio.store().sync_queue().await?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Sync queue is empty.");
        return Ok(());
    }

    for line in format_queue_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_retry_failed(session: &Session) -> Result<(), CliError> {
    let studio = open_studio(session).await?;
    let rearmed = studio.processor().retry_failed().await?;

    if session.json {
        println!("{}", serde_json::json!({ "rearmed": rearmed }));
    } else {
        println!("Re-armed {rearmed} failed change(s)");
    }
    Ok(())
}

pub fn format_queue_lines(entries: &[QueueEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let queued_at = format_timestamp(entry.timestamp);
            let state = if entry.failed {
                "failed".to_string()
            } else if entry.attempts > 0 {
                format!("retry {}", entry.attempts)
            } else {
                "pending".to_string()
            };
            let mut line = format!(
                "#{:<5} {:<6}  {:<10}  {}  {queued_at}  {state}",
                entry.seq,
                entry.action.as_str(),
                entry.collection.as_str(),
                entry.record_id
            );
            if let Some(error) = &entry.last_error {
                line.push_str(&format!("  ({error})"));
            }
            line
        })
        .collect()
}
