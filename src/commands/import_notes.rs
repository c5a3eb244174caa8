use std::fs::File;
use std::io::{self, Read, Write};

use anyhow::{Context, Result, bail};
use csv::StringRecord;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::ImportNotesArgs;
use crate::model::NotesImportSummary;
use crate::schema::ensure_notes_schema;
use crate::store::{insert_note, insert_patient_if_absent, open_store, patient_exists};

const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone)]
pub struct NoteColumns {
    pub patient: String,
    pub note: String,
}

pub fn run(args: ImportNotesArgs) -> Result<()> {
    let delimiter = match u8::try_from(args.delimiter) {
        Ok(byte) if byte.is_ascii() => byte,
        _ => bail!("CSV delimiter must be a single ASCII character: {:?}", args.delimiter),
    };

    info!(path = %args.csv_path.display(), "reading notes file");
    let file = File::open(&args.csv_path)
        .with_context(|| format!("failed to open {}", args.csv_path.display()))?;

    let mut connection = open_store(&args.db_path)?;
    ensure_notes_schema(&connection)?;

    let columns = NoteColumns {
        patient: args.patient_column.clone(),
        note: args.note_column.clone(),
    };
    let summary = import_notes(&mut connection, notes_reader(file, delimiter), &columns)?;
    drop(connection);

    info!(
        total = summary.total_rows,
        imported = summary.imported,
        patients_created = summary.patients_created,
        skipped = summary.skipped,
        "notes import completed"
    );

    write_summary(&summary)
}

pub fn notes_reader<R: Read>(input: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input)
}

/// Loads every row as one `RadiologistsData` record inside a single
/// transaction. Rows that cannot be read or inserted are logged and counted
/// as skipped; a patient missing from `Patients` is created first.
pub fn import_notes<R: Read>(
    connection: &mut Connection,
    mut reader: csv::Reader<R>,
    columns: &NoteColumns,
) -> Result<NotesImportSummary> {
    let headers = reader
        .headers()
        .context("failed to read CSV header row")?
        .clone();
    info!(columns = ?headers.iter().collect::<Vec<_>>(), "found CSV columns");

    let patient_index = column_index(&headers, &columns.patient)?;
    let note_index = column_index(&headers, &columns.note)?;

    let tx = connection
        .transaction()
        .context("failed to begin notes transaction")?;
    let mut summary = NotesImportSummary::default();

    for (row_index, record) in reader.records().enumerate() {
        summary.total_rows += 1;
        // Line 1 is the header row.
        let line = row_index + 2;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(line, error = %err, "skipping unreadable CSV row");
                summary.skipped += 1;
                continue;
            }
        };

        let patient_id = match parse_patient_id(record.get(patient_index)) {
            Ok(patient_id) => patient_id,
            Err(err) => {
                warn!(line, error = %err, "skipping row without a usable patient id");
                summary.skipped += 1;
                continue;
            }
        };
        let note = note_text(record.get(note_index));

        if !patient_exists(&tx, patient_id)? {
            info!(patient_id, "creating new patient");
            insert_patient_if_absent(&tx, patient_id)?;
            summary.patients_created += 1;
        }

        match insert_note(&tx, patient_id, note) {
            Ok(_) => {
                summary.imported += 1;
                if summary.imported % PROGRESS_EVERY == 0 {
                    info!(imported = summary.imported, "imported notes so far");
                }
            }
            Err(err) => {
                warn!(patient_id, line, error = %err, "failed to import note");
                summary.skipped += 1;
            }
        }
    }

    tx.commit().context("failed to commit notes import")?;
    Ok(summary)
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|header| header == name) {
        Some(index) => Ok(index),
        None => bail!(
            "CSV is missing required column {name:?} (found: {:?})",
            headers.iter().collect::<Vec<_>>()
        ),
    }
}

/// Accepts plain integers and whole-number floats such as `12.0`, which
/// spreadsheet exports produce for numeric columns with gaps.
fn parse_patient_id(field: Option<&str>) -> Result<i64> {
    let raw = field.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        bail!("patient id is empty");
    }

    if let Ok(patient_id) = raw.parse::<i64>() {
        return Ok(patient_id);
    }

    let value = raw
        .parse::<f64>()
        .with_context(|| format!("patient id is not a number: {raw:?}"))?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Ok(value as i64);
    }

    bail!("patient id is not a whole number: {raw:?}")
}

fn note_text(field: Option<&str>) -> Option<&str> {
    field.filter(|text| !text.trim().is_empty())
}

fn write_summary(summary: &NotesImportSummary) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let rule = "=".repeat(50);

    writeln!(output, "{rule}")?;
    writeln!(output, "IMPORT COMPLETED!")?;
    writeln!(output, "{rule}")?;
    writeln!(output, "Total records in CSV:  {}", summary.total_rows)?;
    writeln!(output, "Successfully imported: {}", summary.imported)?;
    writeln!(output, "New patients created:  {}", summary.patients_created)?;
    writeln!(output, "Skipped (errors):      {}", summary.skipped)?;
    writeln!(output, "{rule}")?;

    output.flush()?;
    Ok(())
}
