use scriptstudio_core::Collection;

use crate::commands::common::{open_studio, Session};
use crate::error::CliError;

pub async fn run_delete(collection: Collection, id: &str, session: &Session) -> Result<(), CliError> {
    let studio = open_studio(session).await?;
    let outcome = studio.gateway(collection).delete(id).await?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", id.trim());
    }
    Ok(())
}
