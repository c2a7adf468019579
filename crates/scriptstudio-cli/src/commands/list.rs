use scriptstudio_core::{Collection, SortSpec};

use crate::commands::common::{
    format_record_lines, open_studio, record_to_list_item, RecordListItem, Session,
};
use crate::error::CliError;

pub async fn run_list(
    collection: Collection,
    sort: &str,
    limit: Option<usize>,
    session: &Session,
) -> Result<(), CliError> {
    let sort: SortSpec = sort.parse()?;
    let studio = open_studio(session).await?;
    let mut records = studio.gateway(collection).list(&sort).await?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if session.json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No {collection} found.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
