use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::model::Orientation;
use crate::util::ensure_parent_directory;

/// Opens (creating if needed) the catalog database for writing.
pub fn open_store(db_path: &Path) -> Result<Connection> {
    ensure_parent_directory(db_path)?;
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

pub fn open_store_read_only(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        bail!("database file missing: {}", db_path.display());
    }

    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys=ON")?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn patient_exists(connection: &Connection, patient_id: i64) -> Result<bool> {
    let found = connection
        .query_row(
            "SELECT 1 FROM Patients WHERE PatientID = ?1",
            [patient_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Returns true when a new row was written.
pub fn insert_patient_if_absent(connection: &Connection, patient_id: i64) -> Result<bool> {
    let inserted = connection
        .execute(
            "INSERT INTO Patients(PatientID) VALUES(?1) ON CONFLICT(PatientID) DO NOTHING",
            [patient_id],
        )
        .with_context(|| format!("failed to insert patient {patient_id}"))?;
    Ok(inserted > 0)
}

pub fn insert_study(
    connection: &Connection,
    patient_id: i64,
    study_name: &str,
    study_date: Option<NaiveDateTime>,
) -> Result<i64> {
    connection
        .execute(
            "INSERT INTO Studies(PatientID, StudyName, StudyDate) VALUES(?1, ?2, ?3)",
            params![patient_id, study_name, study_date],
        )
        .with_context(|| format!("failed to insert study: {study_name}"))?;
    Ok(connection.last_insert_rowid())
}

pub fn find_study(connection: &Connection, patient_id: i64, study_name: &str) -> Result<Option<i64>> {
    let study_id = connection
        .query_row(
            "SELECT StudyID FROM Studies WHERE PatientID = ?1 AND StudyName = ?2
             ORDER BY StudyID ASC LIMIT 1",
            params![patient_id, study_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(study_id)
}

pub fn insert_series(
    connection: &Connection,
    study_id: i64,
    series_name: &str,
    orientation: Orientation,
    file_count: usize,
) -> Result<i64> {
    connection
        .execute(
            "INSERT INTO Series(StudyID, SeriesName, Orientation, FileCount) VALUES(?1, ?2, ?3, ?4)",
            params![study_id, series_name, orientation.as_str(), file_count as i64],
        )
        .with_context(|| format!("failed to insert series: {series_name}"))?;
    Ok(connection.last_insert_rowid())
}

pub fn find_series(connection: &Connection, study_id: i64, series_name: &str) -> Result<Option<i64>> {
    let series_id = connection
        .query_row(
            "SELECT SeriesID FROM Series WHERE StudyID = ?1 AND SeriesName = ?2
             ORDER BY SeriesID ASC LIMIT 1",
            params![study_id, series_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(series_id)
}

pub fn insert_image(
    connection: &Connection,
    series_id: i64,
    file_name: &str,
    file_path: &str,
) -> Result<()> {
    connection.execute(
        "INSERT INTO Images(SeriesID, FileName, FilePath) VALUES(?1, ?2, ?3)",
        params![series_id, file_name, file_path],
    )?;
    Ok(())
}

pub fn insert_note(connection: &Connection, patient_id: i64, note: Option<&str>) -> Result<i64> {
    connection.execute(
        "INSERT INTO RadiologistsData(PatientID, Note) VALUES(?1, ?2)",
        params![patient_id, note],
    )?;
    Ok(connection.last_insert_rowid())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to run count query: {sql}"))?;
    Ok(count)
}
