use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::model::{ImportCounts, Orientation};
use crate::store::{
    find_series, find_study, insert_image, insert_patient_if_absent, insert_series, insert_study,
};

use super::{FolderEntry, StudyDateParser, is_patient_folder, list_image_files, list_subdirectories};

#[derive(Debug, Clone)]
pub(super) struct ImportOptions {
    pub(super) image_extension: String,
    pub(super) skip_existing: bool,
}

#[derive(Debug, Default)]
pub(super) struct ImportOutcome {
    pub(super) counts: ImportCounts,
    pub(super) warnings: Vec<String>,
}

/// Walks `root/<patient>/<study>/<series>/<image>` and catalogs every series
/// that holds at least one image file.
///
/// Patient and study rows are committed as soon as they are written; a series
/// and its images are committed together once the series folder is done.
pub(super) fn import_tree(
    connection: &mut Connection,
    root: &Path,
    options: &ImportOptions,
) -> Result<ImportOutcome> {
    if !root.is_dir() {
        bail!("MRI root directory not found: {}", root.display());
    }

    let date_parser = StudyDateParser::new()?;
    let mut outcome = ImportOutcome::default();

    for patient_folder in list_subdirectories(root)? {
        if !is_patient_folder(&patient_folder.name) {
            debug!(folder = %patient_folder.name, "skipping non-patient folder");
            continue;
        }

        let patient_id = match patient_folder.name.parse::<i64>() {
            Ok(patient_id) => patient_id,
            Err(err) => {
                let message = format!(
                    "patient folder {} is not a valid identifier: {err}",
                    patient_folder.path.display()
                );
                warn!(folder = %patient_folder.name, error = %err, "skipping patient folder");
                outcome.warnings.push(message);
                continue;
            }
        };

        import_patient(connection, patient_id, &patient_folder, &date_parser, options, &mut outcome)?;
    }

    Ok(outcome)
}

fn import_patient(
    connection: &mut Connection,
    patient_id: i64,
    patient_folder: &FolderEntry,
    date_parser: &StudyDateParser,
    options: &ImportOptions,
    outcome: &mut ImportOutcome,
) -> Result<()> {
    info!(patient_id, "processing patient");
    outcome.counts.patients_seen += 1;
    if insert_patient_if_absent(connection, patient_id)? {
        outcome.counts.patients_inserted += 1;
    }

    for study_folder in list_subdirectories(&patient_folder.path)? {
        let study_id = resolve_study(
            connection,
            patient_id,
            &study_folder,
            date_parser,
            options,
            &mut outcome.counts,
        )?;

        for series_folder in list_subdirectories(&study_folder.path)? {
            import_series(connection, study_id, &series_folder, options, outcome)?;
        }
    }

    Ok(())
}

fn resolve_study(
    connection: &Connection,
    patient_id: i64,
    study_folder: &FolderEntry,
    date_parser: &StudyDateParser,
    options: &ImportOptions,
    counts: &mut ImportCounts,
) -> Result<i64> {
    if options.skip_existing {
        if let Some(study_id) = find_study(connection, patient_id, &study_folder.name)? {
            info!(patient_id, study = %study_folder.name, study_id, "reusing existing study");
            counts.studies_reused += 1;
            return Ok(study_id);
        }
    }

    let study_date = date_parser.parse(&study_folder.name);
    if study_date.is_some() {
        counts.studies_dated += 1;
    }

    let study_id = insert_study(connection, patient_id, &study_folder.name, study_date)?;
    info!(patient_id, study = %study_folder.name, study_id, date = ?study_date, "inserted study");
    counts.studies_inserted += 1;

    Ok(study_id)
}

fn import_series(
    connection: &mut Connection,
    study_id: i64,
    series_folder: &FolderEntry,
    options: &ImportOptions,
    outcome: &mut ImportOutcome,
) -> Result<()> {
    let files = list_image_files(&series_folder.path, &options.image_extension)?;
    if files.is_empty() {
        debug!(series = %series_folder.name, "skipping series without image files");
        outcome.counts.series_skipped_empty += 1;
        return Ok(());
    }

    if options.skip_existing && find_series(connection, study_id, &series_folder.name)?.is_some() {
        info!(study_id, series = %series_folder.name, "series already cataloged");
        outcome.counts.series_skipped_existing += 1;
        return Ok(());
    }

    let orientation = Orientation::classify(&series_folder.name);
    info!(
        study_id,
        series = %series_folder.name,
        orientation = orientation.as_str(),
        files = files.len(),
        "importing series"
    );

    let tx = connection
        .transaction()
        .context("failed to begin series transaction")?;
    let series_id = insert_series(&tx, study_id, &series_folder.name, orientation, files.len())?;

    let mut images_inserted = 0;
    for file in &files {
        let file_path = file.path.display().to_string();
        match insert_image(&tx, series_id, &file.name, &file_path) {
            Ok(()) => images_inserted += 1,
            Err(err) => {
                warn!(file = %file.name, series_id, error = %err, "failed to insert image");
                outcome.counts.image_errors += 1;
                outcome
                    .warnings
                    .push(format!("image {file_path} was not cataloged: {err}"));
            }
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit series {}", series_folder.path.display()))?;

    outcome.counts.series_inserted += 1;
    *outcome
        .counts
        .series_by_orientation
        .entry(orientation)
        .or_insert(0) += 1;
    outcome.counts.images_inserted += images_inserted;

    Ok(())
}
