use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::cli::ReportArgs;
use crate::store::open_store_read_only;

mod output;
mod queries;

use queries::build_report;

use output::render_text;

/// Sample notes are cut to this many characters in the text report.
const NOTE_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub table_counts: TableCounts,
    pub patients_without_notes: i64,
    pub patients_without_studies: i64,
    pub orientation_distribution: Vec<OrientationCount>,
    pub sample: PatientSample,
    pub top_patients: Vec<PatientImageRank>,
    pub note_status: NoteStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub patients: i64,
    pub studies: i64,
    pub series: i64,
    pub images: i64,
    pub radiologists_data: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrientationCount {
    pub orientation: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSample {
    pub patient_id: i64,
    pub found: bool,
    pub notes: Vec<Option<String>>,
    pub studies: Vec<StudySummary>,
    pub series: Vec<SeriesSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudySummary {
    pub name: String,
    pub date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub name: String,
    pub orientation: String,
    pub file_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientImageRank {
    pub patient_id: i64,
    pub studies: i64,
    pub series: i64,
    pub images: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteStatus {
    pub total: i64,
    pub with_note: i64,
    pub null_note: i64,
}

pub fn run(args: ReportArgs) -> Result<()> {
    info!(path = %args.db_path.display(), patient_id = args.patient_id, "building catalog report");

    let connection = open_store_read_only(&args.db_path)?;
    let report = build_report(&connection, args.patient_id, args.top)?;
    drop(connection);

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize report json output")?;
        writeln!(output)?;
    } else {
        render_text(&mut output, &report)?;
    }
    output.flush()?;

    Ok(())
}
