use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

use crate::schema::{ALL_TABLES, table_exists};
use crate::store::{count_rows, patient_exists};

use super::{
    NoteStatus, OrientationCount, PatientImageRank, PatientSample, Report, SeriesSummary,
    StudySummary, TableCounts,
};

/// Runs every report query against `connection`. Nothing is written.
pub fn build_report(connection: &Connection, patient_id: i64, top: usize) -> Result<Report> {
    let mut missing = Vec::new();
    for table in &ALL_TABLES {
        if !table_exists(connection, table.name)? {
            missing.push(table.name);
        }
    }
    if !missing.is_empty() {
        bail!(
            "catalog is missing tables {}; run init-schema or an importer first",
            missing.join(", ")
        );
    }

    Ok(Report {
        table_counts: table_counts(connection)?,
        patients_without_notes: count_rows(
            connection,
            "
            SELECT COUNT(*)
            FROM Patients p
            LEFT JOIN RadiologistsData r ON p.PatientID = r.PatientID
            WHERE r.RecordID IS NULL
            ",
        )?,
        patients_without_studies: count_rows(
            connection,
            "
            SELECT COUNT(*)
            FROM Patients p
            LEFT JOIN Studies s ON p.PatientID = s.PatientID
            WHERE s.StudyID IS NULL
            ",
        )?,
        orientation_distribution: orientation_distribution(connection)?,
        sample: patient_sample(connection, patient_id)?,
        top_patients: top_patients_by_images(connection, top)?,
        note_status: note_status(connection)?,
    })
}

fn table_counts(connection: &Connection) -> Result<TableCounts> {
    Ok(TableCounts {
        patients: count_rows(connection, "SELECT COUNT(*) FROM Patients")?,
        studies: count_rows(connection, "SELECT COUNT(*) FROM Studies")?,
        series: count_rows(connection, "SELECT COUNT(*) FROM Series")?,
        images: count_rows(connection, "SELECT COUNT(*) FROM Images")?,
        radiologists_data: count_rows(connection, "SELECT COUNT(*) FROM RadiologistsData")?,
    })
}

fn orientation_distribution(connection: &Connection) -> Result<Vec<OrientationCount>> {
    let mut statement = connection.prepare(
        "
        SELECT Orientation, COUNT(*) AS Count
        FROM Series
        GROUP BY Orientation
        ORDER BY Count DESC, Orientation ASC
        ",
    )?;

    let rows = statement.query_map([], |row| {
        Ok(OrientationCount {
            orientation: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to load orientation distribution")
}

fn patient_sample(connection: &Connection, patient_id: i64) -> Result<PatientSample> {
    let found = patient_exists(connection, patient_id)?;

    let mut statement = connection.prepare(
        "SELECT Note FROM RadiologistsData WHERE PatientID = ?1 ORDER BY RecordID ASC",
    )?;
    let notes = statement
        .query_map([patient_id], |row| row.get::<_, Option<String>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to load sample patient notes")?;

    let mut statement = connection.prepare(
        "SELECT StudyName, StudyDate FROM Studies WHERE PatientID = ?1 ORDER BY StudyID ASC",
    )?;
    let studies = statement
        .query_map([patient_id], |row| {
            Ok(StudySummary {
                name: row.get(0)?,
                date: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to load sample patient studies")?;

    let mut statement = connection.prepare(
        "
        SELECT s.SeriesName, s.Orientation, s.FileCount
        FROM Series s
        JOIN Studies st ON s.StudyID = st.StudyID
        WHERE st.PatientID = ?1
        ORDER BY s.SeriesID ASC
        ",
    )?;
    let series = statement
        .query_map([patient_id], |row| {
            Ok(SeriesSummary {
                name: row.get(0)?,
                orientation: row.get(1)?,
                file_count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to load sample patient series")?;

    Ok(PatientSample {
        patient_id,
        found,
        notes,
        studies,
        series,
    })
}

/// Ties on image count are ordered by ascending patient id.
fn top_patients_by_images(connection: &Connection, limit: usize) -> Result<Vec<PatientImageRank>> {
    let mut statement = connection.prepare(
        "
        SELECT
          p.PatientID,
          COUNT(DISTINCT st.StudyID) AS Studies,
          COUNT(DISTINCT s.SeriesID) AS SeriesCount,
          COUNT(i.ImageID) AS Images
        FROM Patients p
        JOIN Studies st ON p.PatientID = st.PatientID
        JOIN Series s ON st.StudyID = s.StudyID
        JOIN Images i ON s.SeriesID = i.SeriesID
        GROUP BY p.PatientID
        ORDER BY Images DESC, p.PatientID ASC
        LIMIT ?1
        ",
    )?;

    let rows = statement.query_map(params![limit as i64], |row| {
        Ok(PatientImageRank {
            patient_id: row.get(0)?,
            studies: row.get(1)?,
            series: row.get(2)?,
            images: row.get(3)?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to rank patients by image count")
}

fn note_status(connection: &Connection) -> Result<NoteStatus> {
    let status = connection
        .query_row(
            "
            SELECT
              COUNT(*),
              COALESCE(SUM(CASE WHEN Note IS NOT NULL THEN 1 ELSE 0 END), 0),
              COALESCE(SUM(CASE WHEN Note IS NULL THEN 1 ELSE 0 END), 0)
            FROM RadiologistsData
            ",
            [],
            |row| {
                Ok(NoteStatus {
                    total: row.get(0)?,
                    with_note: row.get(1)?,
                    null_note: row.get(2)?,
                })
            },
        )
        .context("failed to count note status")?;
    Ok(status)
}
