use scriptstudio_core::{Collection, RecordId};

use crate::commands::common::{open_studio, parse_assignments, print_record, Session};
use crate::error::CliError;

pub async fn run_update(
    collection: Collection,
    id: &str,
    assignments: &[String],
    session: &Session,
) -> Result<(), CliError> {
    let id = RecordId::parse(id)?;
    let fields = parse_assignments(assignments)?;
    let studio = open_studio(session).await?;
    let record = studio.gateway(collection).update(&id, fields).await?;

    print_record(&record, session.json)
}
