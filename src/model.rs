use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Orientation {
    Sagittal,
    Transverse,
    Box,
    Spine,
    Unknown,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sagittal => "Sagittal",
            Self::Transverse => "Transverse",
            Self::Box => "Box",
            Self::Spine => "Spine",
            Self::Unknown => "Unknown",
        }
    }

    /// Classifies a series folder name. Rules are tried in table order and the
    /// first rule with a keyword contained in the upper-cased name wins.
    pub fn classify(series_name: &str) -> Self {
        let upper = series_name.to_uppercase();
        ORIENTATION_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| upper.contains(keyword)))
            .map(|(_, orientation)| *orientation)
            .unwrap_or(Self::Unknown)
    }
}

pub const ORIENTATION_RULES: [(&[&str], Orientation); 4] = [
    (&["SAG"], Orientation::Sagittal),
    (&["TRA"], Orientation::Transverse),
    (&["BOX"], Orientation::Box),
    (&["C-SPINE", "CSPINE", "L-SPINE", "LSPINE"], Orientation::Spine),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportCounts {
    pub patients_seen: usize,
    pub patients_inserted: usize,
    pub studies_inserted: usize,
    pub studies_reused: usize,
    pub studies_dated: usize,
    pub series_inserted: usize,
    pub series_skipped_empty: usize,
    pub series_skipped_existing: usize,
    pub series_by_orientation: BTreeMap<Orientation, usize>,
    pub images_inserted: usize,
    pub image_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOptionsRecord {
    pub image_extension: String,
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub root: String,
    pub db_path: String,
    pub options: ImportOptionsRecord,
    pub tables_created: Vec<String>,
    pub counts: ImportCounts,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotesImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub patients_created: usize,
    pub skipped: usize,
}
