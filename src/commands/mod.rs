pub mod import_mri;
pub mod import_notes;
pub mod init_schema;
pub mod report;
