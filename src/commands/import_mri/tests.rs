use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use tempfile::TempDir;

use super::*;
use crate::model::Orientation;
use crate::schema::ensure_imaging_schema;
use crate::store::count_rows;

fn memory_store() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory DB should open");
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .expect("foreign keys should enable");
    ensure_imaging_schema(&connection).expect("schema should be created");
    connection
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent folders should be created");
    }
    fs::write(path, b"").expect("fixture file should be written");
}

/// 0001 has one dated study with two image series and a series holding only
/// a text file; 0002 has one undated study; `notes` and the loose `0004` file
/// are not patient folders.
fn fixture_tree() -> TempDir {
    let dir = TempDir::new().expect("temp dir should be created");
    let root = dir.path();

    let study = root.join("0001").join("20230714_101530_LSPINE");
    touch(&study.join("T2_TSE_SAG").join("b.ima"));
    touch(&study.join("T2_TSE_SAG").join("a.IMA"));
    touch(&study.join("T2_TSE_SAG").join("readme.txt"));
    touch(&study.join("T2_TSE_TRA").join("c.ima"));
    touch(&study.join("localizer").join("readme.txt"));

    touch(&root.join("0002").join("no_date_here").join("BOX_survey").join("x.ima"));

    touch(&root.join("notes").join("study").join("T2_SAG").join("y.ima"));
    touch(&root.join("0004"));

    dir
}

fn options(skip_existing: bool) -> ImportOptions {
    ImportOptions {
        image_extension: "ima".to_string(),
        skip_existing,
    }
}

#[test]
fn import_tree_catalogs_digit_named_patients_only() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    let outcome = import_tree(&mut connection, dir.path(), &options(false)).expect("import");

    let mut statement = connection
        .prepare("SELECT PatientID FROM Patients ORDER BY PatientID")
        .expect("query should prepare");
    let patients = statement
        .query_map([], |row| row.get::<_, i64>(0))
        .expect("query should run")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows should decode");
    assert_eq!(patients, vec![1, 2]);

    assert_eq!(outcome.counts.patients_seen, 2);
    assert_eq!(outcome.counts.patients_inserted, 2);
    assert_eq!(outcome.counts.studies_inserted, 2);
    assert_eq!(outcome.counts.studies_dated, 1);
    assert_eq!(outcome.counts.series_inserted, 3);
    assert_eq!(outcome.counts.series_skipped_empty, 1);
    assert_eq!(outcome.counts.images_inserted, 4);
    assert_eq!(outcome.counts.image_errors, 0);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn import_tree_records_orientation_and_file_counts() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    let outcome = import_tree(&mut connection, dir.path(), &options(false)).expect("import");

    let mut statement = connection
        .prepare("SELECT SeriesName, Orientation, FileCount FROM Series ORDER BY SeriesID")
        .expect("query should prepare");
    let series = statement
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .expect("query should run")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows should decode");

    assert_eq!(
        series,
        vec![
            ("T2_TSE_SAG".to_string(), "Sagittal".to_string(), 2),
            ("T2_TSE_TRA".to_string(), "Transverse".to_string(), 1),
            ("BOX_survey".to_string(), "Box".to_string(), 1),
        ]
    );
    assert_eq!(
        outcome.counts.series_by_orientation.get(&Orientation::Sagittal),
        Some(&1)
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM Series WHERE SeriesName = 'localizer'")
            .expect("count"),
        0
    );
}

#[test]
fn import_tree_inserts_images_sorted_with_full_paths() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    import_tree(&mut connection, dir.path(), &options(false)).expect("import");

    let mut statement = connection
        .prepare(
            "SELECT i.FileName, i.FilePath FROM Images i
             JOIN Series s ON s.SeriesID = i.SeriesID
             WHERE s.SeriesName = 'T2_TSE_SAG'
             ORDER BY i.ImageID",
        )
        .expect("query should prepare");
    let images = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .expect("query should run")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows should decode");

    let series_dir = dir
        .path()
        .join("0001")
        .join("20230714_101530_LSPINE")
        .join("T2_TSE_SAG");
    assert_eq!(
        images,
        vec![
            (
                "a.IMA".to_string(),
                series_dir.join("a.IMA").display().to_string()
            ),
            (
                "b.ima".to_string(),
                series_dir.join("b.ima").display().to_string()
            ),
        ]
    );
}

#[test]
fn import_tree_stores_parsed_study_dates() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    import_tree(&mut connection, dir.path(), &options(false)).expect("import");

    let dated: Option<chrono::NaiveDateTime> = connection
        .query_row(
            "SELECT StudyDate FROM Studies WHERE PatientID = 1",
            [],
            |row| row.get(0),
        )
        .expect("study row");
    let expected = NaiveDate::from_ymd_opt(2023, 7, 14)
        .and_then(|date| date.and_hms_opt(10, 15, 30))
        .expect("valid timestamp");
    assert_eq!(dated, Some(expected));

    let undated: Option<chrono::NaiveDateTime> = connection
        .query_row(
            "SELECT StudyDate FROM Studies WHERE PatientID = 2",
            [],
            |row| row.get(0),
        )
        .expect("study row");
    assert_eq!(undated, None);
}

#[test]
fn rerun_without_skip_existing_duplicates_studies_but_not_patients() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    import_tree(&mut connection, dir.path(), &options(false)).expect("first import");
    let second = import_tree(&mut connection, dir.path(), &options(false)).expect("second import");

    assert_eq!(second.counts.patients_inserted, 0);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Patients").expect("count"), 2);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Studies").expect("count"), 4);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Images").expect("count"), 8);
}

#[test]
fn rerun_with_skip_existing_adds_no_rows() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    import_tree(&mut connection, dir.path(), &options(true)).expect("first import");
    let second = import_tree(&mut connection, dir.path(), &options(true)).expect("second import");

    assert_eq!(second.counts.studies_inserted, 0);
    assert_eq!(second.counts.studies_reused, 2);
    assert_eq!(second.counts.series_inserted, 0);
    assert_eq!(second.counts.series_skipped_existing, 3);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Studies").expect("count"), 2);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Series").expect("count"), 3);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Images").expect("count"), 4);
}

#[test]
fn skip_existing_picks_up_series_added_after_the_first_run() {
    let dir = fixture_tree();
    let mut connection = memory_store();

    import_tree(&mut connection, dir.path(), &options(true)).expect("first import");
    touch(
        &dir.path()
            .join("0002")
            .join("no_date_here")
            .join("CSPINE_T1")
            .join("z.ima"),
    );
    let second = import_tree(&mut connection, dir.path(), &options(true)).expect("second import");

    assert_eq!(second.counts.series_inserted, 1);
    assert_eq!(
        second.counts.series_by_orientation.get(&Orientation::Spine),
        Some(&1)
    );
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Images").expect("count"), 5);
}

#[test]
fn import_tree_fails_when_root_is_missing() {
    let dir = TempDir::new().expect("temp dir should be created");
    let mut connection = memory_store();

    let result = import_tree(&mut connection, &dir.path().join("missing"), &options(false));
    assert!(result.is_err());
}

#[test]
fn study_date_parser_extracts_first_token() {
    let parser = StudyDateParser::new().expect("parser should build");

    let parsed = parser.parse("20230714_101530_foo");
    let expected = NaiveDate::from_ymd_opt(2023, 7, 14).and_then(|date| date.and_hms_opt(10, 15, 30));
    assert_eq!(parsed, expected);
    assert_eq!(parser.parse("no_date_here"), None);
}

#[test]
fn study_date_parser_returns_none_for_impossible_dates() {
    let parser = StudyDateParser::new().expect("parser should build");

    assert_eq!(parser.parse("20231345_101530"), None);
    assert_eq!(parser.parse("20230714_256199"), None);
    assert_eq!(parser.parse("2023071_101530"), None);
}

#[test]
fn patient_folder_names_must_be_all_digits() {
    assert!(is_patient_folder("0001"));
    assert!(is_patient_folder("42"));
    assert!(!is_patient_folder(""));
    assert!(!is_patient_folder("0001a"));
    assert!(!is_patient_folder("notes"));
    assert!(!is_patient_folder("٣"));
}

#[test]
fn list_image_files_matches_extension_ignoring_case() {
    let dir = TempDir::new().expect("temp dir should be created");
    touch(&dir.path().join("b.IMA"));
    touch(&dir.path().join("a.ima"));
    touch(&dir.path().join("c.dcm"));
    fs::create_dir_all(dir.path().join("d.ima")).expect("folder should be created");

    let names = list_image_files(dir.path(), "ima")
        .expect("listing should work")
        .into_iter()
        .map(|entry| entry.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a.ima".to_string(), "b.IMA".to_string()]);
}

#[test]
fn list_image_files_counts_a_bare_extension_file_name() {
    let dir = TempDir::new().expect("temp dir should be created");
    touch(&dir.path().join(".ima"));
    touch(&dir.path().join("scan.ima.bak"));
    touch(&dir.path().join("ima"));
    fs::create_dir_all(dir.path().join("d.ima")).expect("folder should be created");

    let names = list_image_files(dir.path(), "IMA")
        .expect("listing should work")
        .into_iter()
        .map(|entry| entry.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec![".ima".to_string()]);
}

#[test]
fn rejected_image_is_logged_and_the_rest_of_the_series_is_kept() {
    let dir = fixture_tree();
    let mut connection = memory_store();
    connection
        .execute_batch(
            "CREATE TRIGGER reject_image BEFORE INSERT ON Images
             WHEN NEW.FileName = 'b.ima'
             BEGIN SELECT RAISE(ABORT, 'image rejected'); END;",
        )
        .expect("trigger should be created");

    let outcome = import_tree(&mut connection, dir.path(), &options(false))
        .expect("import should finish despite the rejected image");

    assert_eq!(outcome.counts.image_errors, 1);
    assert_eq!(outcome.counts.images_inserted, 3);
    assert_eq!(outcome.counts.series_inserted, 3);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("b.ima"));

    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Images").expect("count"), 3);
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM Images WHERE FileName = 'a.IMA'")
            .expect("count"),
        1
    );
    let file_count: i64 = connection
        .query_row(
            "SELECT FileCount FROM Series WHERE SeriesName = 'T2_TSE_SAG'",
            [],
            |row| row.get(0),
        )
        .expect("series row should be committed");
    assert_eq!(file_count, 2);
}

#[test]
fn failed_series_insert_aborts_but_keeps_committed_patients_and_studies() {
    let dir = fixture_tree();
    let mut connection = memory_store();
    connection
        .execute_batch(
            "CREATE TRIGGER reject_series BEFORE INSERT ON Series
             WHEN NEW.SeriesName = 'BOX_survey'
             BEGIN SELECT RAISE(ABORT, 'series rejected'); END;",
        )
        .expect("trigger should be created");

    let result = import_tree(&mut connection, dir.path(), &options(false));
    assert!(result.is_err());

    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Patients").expect("count"), 2);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Studies").expect("count"), 2);
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM Studies WHERE PatientID = 2")
            .expect("count"),
        1
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM Series WHERE SeriesName = 'BOX_survey'")
            .expect("count"),
        0
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM Images WHERE FilePath LIKE '%BOX_survey%'")
            .expect("count"),
        0
    );
    // Series from patient 0001 were committed before the failure.
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Series").expect("count"), 2);
    assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM Images").expect("count"), 3);
}
