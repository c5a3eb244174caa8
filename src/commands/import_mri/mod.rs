mod run;
mod study_date;
#[cfg(test)]
mod tests;
mod tree;
mod walk;

pub use run::run;

use study_date::StudyDateParser;
use tree::{ImportOptions, ImportOutcome, import_tree};
use walk::{FolderEntry, is_patient_folder, list_image_files, list_subdirectories};
