use std::io::{self, Write};

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::cli::ImportMriArgs;
use crate::model::{ImportCounts, ImportOptionsRecord, ImportRunManifest};
use crate::schema::{DB_SCHEMA_VERSION, ensure_imaging_schema};
use crate::store::open_store;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

use super::{ImportOptions, ImportOutcome, import_tree};

pub fn run(args: ImportMriArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("mri-import-{}", utc_compact_string(started_ts));

    info!(root = %args.root.display(), db_path = %args.db_path.display(), run_id = %run_id, "starting MRI import");

    let mut connection = open_store(&args.db_path)?;
    let tables_created = ensure_imaging_schema(&connection)?;

    let options = ImportOptions {
        image_extension: args.image_extension.trim_start_matches('.').to_string(),
        skip_existing: args.skip_existing,
    };
    let ImportOutcome { counts, warnings } = import_tree(&mut connection, &args.root, &options)?;
    drop(connection);

    info!(
        patients = counts.patients_seen,
        studies = counts.studies_inserted,
        series = counts.series_inserted,
        images = counts.images_inserted,
        image_errors = counts.image_errors,
        "MRI import completed"
    );

    if let Some(manifest_path) = &args.manifest_path {
        let manifest = ImportRunManifest {
            manifest_version: 1,
            run_id,
            db_schema_version: DB_SCHEMA_VERSION.to_string(),
            status: "completed".to_string(),
            started_at,
            updated_at: now_utc_string(),
            root: args.root.display().to_string(),
            db_path: args.db_path.display().to_string(),
            options: ImportOptionsRecord {
                image_extension: options.image_extension.clone(),
                skip_existing: options.skip_existing,
            },
            tables_created: tables_created.iter().map(|name| name.to_string()).collect(),
            counts: counts.clone(),
            warnings,
        };
        write_json_pretty(manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), "wrote import run manifest");
    }

    write_summary(&counts)
}

fn write_summary(counts: &ImportCounts) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Import completed!")?;
    writeln!(
        output,
        "Patients: {} seen, {} new",
        counts.patients_seen, counts.patients_inserted
    )?;
    writeln!(
        output,
        "Studies:  {} inserted, {} reused, {} with a parsed date",
        counts.studies_inserted, counts.studies_reused, counts.studies_dated
    )?;
    writeln!(
        output,
        "Series:   {} inserted, {} without images, {} already cataloged",
        counts.series_inserted, counts.series_skipped_empty, counts.series_skipped_existing
    )?;
    for (orientation, count) in &counts.series_by_orientation {
        writeln!(output, "  {:<12} {count:>5}", orientation.as_str())?;
    }
    writeln!(
        output,
        "Images:   {} inserted, {} errors",
        counts.images_inserted, counts.image_errors
    )?;

    output.flush()?;
    Ok(())
}
