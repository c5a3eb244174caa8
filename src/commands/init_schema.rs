use anyhow::Result;
use tracing::info;

use crate::cli::InitSchemaArgs;
use crate::schema::{DB_SCHEMA_VERSION, ensure_full_schema};
use crate::store::open_store;

pub fn run(args: InitSchemaArgs) -> Result<()> {
    let connection = open_store(&args.db_path)?;
    let created = ensure_full_schema(&connection)?;

    info!(
        path = %args.db_path.display(),
        created = created.len(),
        db_schema_version = DB_SCHEMA_VERSION,
        "schema ready"
    );

    Ok(())
}
