use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use scriptstudio_core::config::SyncSettings;
use scriptstudio_core::models::Fields;
use scriptstudio_core::remote::HttpRemoteApi;
use scriptstudio_core::util::compact_text;
use scriptstudio_core::{ConnectivitySignal, LocalStore, Record, Studio};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// Fields tried in order when rendering a one-line preview
const PREVIEW_FIELDS: [&str; 4] = ["title", "name", "content", "citation"];

/// Global options shared by every subcommand
#[derive(Debug, Clone)]
pub struct Session {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub offline: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub sync_status: String,
    pub preview: String,
    pub updated_date: i64,
    pub relative_time: String,
}

pub fn load_settings(config_path: Option<&Path>) -> Result<SyncSettings, CliError> {
    match config_path {
        Some(path) => Ok(SyncSettings::from_json_file(path)?),
        None => Ok(SyncSettings::from_env()?),
    }
}

/// Open the local store and wire a session around it.
///
/// The connectivity signal starts from a reachability probe of the API,
/// bounded by the remote timeout; `--offline` and a missing API URL both
/// start offline.
pub async fn open_studio(session: &Session) -> Result<Studio, CliError> {
    let settings = load_settings(session.config_path.as_deref())?;
    let store = LocalStore::open_path(&session.db_path).await?;
    let connectivity = initial_connectivity(&settings, session.offline).await?;
    Ok(Studio::from_settings(store, &settings, connectivity)?)
}

async fn initial_connectivity(
    settings: &SyncSettings,
    offline: bool,
) -> Result<ConnectivitySignal, CliError> {
    if offline {
        return Ok(ConnectivitySignal::offline());
    }
    let Some(url) = settings.api_base_url.clone() else {
        tracing::debug!("No API base URL configured; running local-only");
        return Ok(ConnectivitySignal::offline());
    };

    let api = HttpRemoteApi::new(url, settings.api_token.clone())?;
    let reachable = api.probe(settings.remote_timeout()).await;
    if !reachable {
        tracing::info!("API at {} is unreachable; working offline", api.base_url());
    }
    Ok(ConnectivitySignal::new(reachable))
}

/// Parse repeated `key=value` assignments into a field map.
///
/// Values that parse as JSON keep their type (`order=3`, `archived=true`,
/// `tags=["a"]`); anything else is stored as a string.
pub fn parse_assignments(assignments: &[String]) -> Result<Fields, CliError> {
    let mut fields = Fields::new();
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        fields.insert(key, value);
    }
    Ok(fields)
}

pub fn parse_assignment(assignment: &str) -> Result<(String, Value), CliError> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| CliError::InvalidAssignment(assignment.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::EmptyFieldName(assignment.to_string()));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub fn record_preview(record: &Record, max_chars: usize) -> String {
    let text = PREVIEW_FIELDS
        .iter()
        .find_map(|name| record.fields.get(*name).and_then(Value::as_str))
        .map_or_else(|| "(untitled)".to_string(), compact_text);

    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    } else {
        text
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let preview = record_preview(record, 40);
            let relative_time = format_relative_time(record.updated_date, now_ms);
            let status = record.sync_status.as_str();

            if record.sync_status.is_confirmed() {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  [{status}]")
            }
        })
        .collect()
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id.to_string(),
        sync_status: record.sync_status.to_string(),
        preview: record_preview(record, 80),
        updated_date: record.updated_date,
        relative_time: format_relative_time(record.updated_date, now_ms),
    }
}

/// Print a single record: the full JSON document, or `id  status` for humans.
pub fn print_record(record: &Record, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("{}  {}", record.id, record.sync_status);
    }
    Ok(())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SCRIPTSTUDIO_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scriptstudio")
        .join("studio.db")
}
