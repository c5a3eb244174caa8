use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub ddl: &'static str,
}

const METADATA: TableSpec = TableSpec {
    name: "metadata",
    ddl: "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        )
        ",
};

const PATIENTS: TableSpec = TableSpec {
    name: "Patients",
    ddl: "
        CREATE TABLE IF NOT EXISTS Patients (
          PatientID INTEGER PRIMARY KEY
        )
        ",
};

const STUDIES: TableSpec = TableSpec {
    name: "Studies",
    ddl: "
        CREATE TABLE IF NOT EXISTS Studies (
          StudyID INTEGER PRIMARY KEY AUTOINCREMENT,
          PatientID INTEGER NOT NULL,
          StudyName TEXT NOT NULL,
          StudyDate TEXT,
          FOREIGN KEY(PatientID) REFERENCES Patients(PatientID)
        )
        ",
};

const SERIES: TableSpec = TableSpec {
    name: "Series",
    ddl: "
        CREATE TABLE IF NOT EXISTS Series (
          SeriesID INTEGER PRIMARY KEY AUTOINCREMENT,
          StudyID INTEGER NOT NULL,
          SeriesName TEXT NOT NULL,
          Orientation TEXT NOT NULL
            CHECK (Orientation IN ('Sagittal', 'Transverse', 'Box', 'Spine', 'Unknown')),
          FileCount INTEGER NOT NULL CHECK (FileCount >= 0),
          FOREIGN KEY(StudyID) REFERENCES Studies(StudyID)
        )
        ",
};

const IMAGES: TableSpec = TableSpec {
    name: "Images",
    ddl: "
        CREATE TABLE IF NOT EXISTS Images (
          ImageID INTEGER PRIMARY KEY AUTOINCREMENT,
          SeriesID INTEGER NOT NULL,
          FileName TEXT NOT NULL,
          FilePath TEXT NOT NULL,
          FOREIGN KEY(SeriesID) REFERENCES Series(SeriesID)
        )
        ",
};

const RADIOLOGISTS_DATA: TableSpec = TableSpec {
    name: "RadiologistsData",
    ddl: "
        CREATE TABLE IF NOT EXISTS RadiologistsData (
          RecordID INTEGER PRIMARY KEY AUTOINCREMENT,
          PatientID INTEGER NOT NULL,
          Note TEXT,
          FOREIGN KEY(PatientID) REFERENCES Patients(PatientID)
        )
        ",
};

/// Parents come before children so foreign keys always point backwards.
pub const IMAGING_TABLES: [TableSpec; 4] = [PATIENTS, STUDIES, SERIES, IMAGES];
pub const NOTES_TABLES: [TableSpec; 2] = [PATIENTS, RADIOLOGISTS_DATA];
pub const ALL_TABLES: [TableSpec; 5] = [PATIENTS, STUDIES, SERIES, IMAGES, RADIOLOGISTS_DATA];

const INDEXES: [(&str, &str); 4] = [
    (
        "Studies",
        "CREATE INDEX IF NOT EXISTS idx_studies_patient_name ON Studies(PatientID, StudyName)",
    ),
    (
        "Series",
        "CREATE INDEX IF NOT EXISTS idx_series_study_name ON Series(StudyID, SeriesName)",
    ),
    (
        "Images",
        "CREATE INDEX IF NOT EXISTS idx_images_series ON Images(SeriesID)",
    ),
    (
        "RadiologistsData",
        "CREATE INDEX IF NOT EXISTS idx_radiologists_data_patient ON RadiologistsData(PatientID)",
    ),
];

pub fn ensure_imaging_schema(connection: &Connection) -> Result<Vec<&'static str>> {
    ensure_tables(connection, &IMAGING_TABLES)
}

pub fn ensure_notes_schema(connection: &Connection) -> Result<Vec<&'static str>> {
    ensure_tables(connection, &NOTES_TABLES)
}

pub fn ensure_full_schema(connection: &Connection) -> Result<Vec<&'static str>> {
    ensure_tables(connection, &ALL_TABLES)
}

/// Creates every table in `tables` that is not already present and returns
/// the names of the ones it created.
pub fn ensure_tables(connection: &Connection, tables: &[TableSpec]) -> Result<Vec<&'static str>> {
    let mut created = Vec::new();

    for table in std::iter::once(&METADATA).chain(tables) {
        if table_exists(connection, table.name)? {
            continue;
        }
        connection
            .execute_batch(table.ddl)
            .with_context(|| format!("failed to create table {}", table.name))?;
        if table.name != METADATA.name {
            info!(table = table.name, "created table");
            created.push(table.name);
        }
    }

    for (table_name, ddl) in INDEXES {
        if tables.iter().any(|table| table.name == table_name) {
            connection
                .execute_batch(ddl)
                .with_context(|| format!("failed to create index on {table_name}"))?;
        }
    }

    write_schema_metadata(connection)?;

    Ok(created)
}

/// Table names are matched ignoring case, as SQLite resolves them.
pub fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let found = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("failed to look up table {name}"))?;
    Ok(found.is_some())
}

fn write_schema_metadata(connection: &Connection) -> Result<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;
    Ok(())
}
