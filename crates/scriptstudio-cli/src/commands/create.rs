use scriptstudio_core::Collection;

use crate::commands::common::{open_studio, parse_assignments, print_record, Session};
use crate::error::CliError;

pub async fn run_create(
    collection: Collection,
    assignments: &[String],
    session: &Session,
) -> Result<(), CliError> {
    let fields = parse_assignments(assignments)?;
    let studio = open_studio(session).await?;
    let record = studio.gateway(collection).create(fields).await?;

    print_record(&record, session.json)
}
