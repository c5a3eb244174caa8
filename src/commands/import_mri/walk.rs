use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FolderEntry {
    pub(super) name: String,
    pub(super) path: PathBuf,
}

pub(super) fn is_patient_folder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_ascii_digit())
}

/// Immediate subdirectories of `dir`, sorted by name.
pub(super) fn list_subdirectories(dir: &Path) -> Result<Vec<FolderEntry>> {
    let mut folders = list_entries(dir, |file_type| file_type.is_dir())?;
    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// Regular files in `dir` whose name ends in `.{extension}` ignoring case,
/// sorted by file name. A file named just `.ima` counts.
pub(super) fn list_image_files(dir: &Path, extension: &str) -> Result<Vec<FolderEntry>> {
    let suffix = format!(".{}", extension.to_ascii_lowercase());
    let mut files = list_entries(dir, |file_type| file_type.is_file())?;
    files.retain(|entry| entry.name.to_ascii_lowercase().ends_with(&suffix));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

fn list_entries(dir: &Path, keep: impl Fn(&fs::FileType) -> bool) -> Result<Vec<FolderEntry>> {
    let mut out = Vec::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        // Follows symlinks, so a linked study folder still counts as a folder.
        let file_type = match fs::metadata(&path) {
            Ok(metadata) => metadata.file_type(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !keep(&file_type) {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => out.push(FolderEntry { name, path }),
            Err(raw) => {
                warn!(path = %path.display(), name = ?raw, "skipping entry with non UTF-8 name");
            }
        }
    }

    Ok(out)
}
