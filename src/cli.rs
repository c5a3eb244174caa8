use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "lumbar-mri",
    version,
    about = "Load lumbar MRI folders and radiologist notes into a SQLite catalog"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the catalog tables if they are missing.
    InitSchema(InitSchemaArgs),
    /// Walk a patient/study/series folder tree and catalog its images.
    ImportMri(ImportMriArgs),
    /// Load clinician notes from a CSV file.
    ImportNotes(ImportNotesArgs),
    /// Print summary statistics for a populated catalog.
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InitSchemaArgs {
    #[arg(long, default_value = "lumbar_mri.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ImportMriArgs {
    #[arg(long, default_value = "lumbar_mri.sqlite")]
    pub db_path: PathBuf,

    /// Folder containing the digit-named patient folders (0001, 0002, ...).
    #[arg(long)]
    pub root: PathBuf,

    #[arg(long, default_value = "ima")]
    pub image_extension: String,

    /// Reuse studies and skip series already cataloged under the same name.
    #[arg(long, default_value_t = false)]
    pub skip_existing: bool,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportNotesArgs {
    #[arg(long, default_value = "lumbar_mri.sqlite")]
    pub db_path: PathBuf,

    #[arg(long = "csv")]
    pub csv_path: PathBuf,

    #[arg(long, default_value = "Patient ID")]
    pub patient_column: String,

    #[arg(long, default_value = "Clinician's Notes")]
    pub note_column: String,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = "lumbar_mri.sqlite")]
    pub db_path: PathBuf,

    /// Patient shown in the sample section.
    #[arg(long, default_value_t = 1)]
    pub patient_id: i64,

    #[arg(long, default_value_t = 5)]
    pub top: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
