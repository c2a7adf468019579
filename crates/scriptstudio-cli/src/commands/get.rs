use scriptstudio_core::{Collection, RecordId};

use crate::commands::common::{open_studio, Session};
use crate::error::CliError;

pub async fn run_get(collection: Collection, id: &str, session: &Session) -> Result<(), CliError> {
    let id = RecordId::parse(id)?;
    let studio = open_studio(session).await?;
    let record = studio
        .gateway(collection)
        .get(&id)
        .await?
        .ok_or_else(|| CliError::RecordNotFound {
            collection,
            id: id.to_string(),
        })?;

    // Single records are always shown in full
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
