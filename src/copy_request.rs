use crate::models::FileEntry;
use crate::resolve::Resolution;

/// A resolved copy waiting for the user's confirmation.
#[derive(Clone, Debug)]
pub struct CopyRequest {
    pub files: Vec<FileEntry>,
    pub not_found: Vec<String>,
    pub source_label: String,
    pub dest_folder_id: String,
    pub dest_label: String,
}

impl CopyRequest {
    pub fn new(resolution: Resolution, source_label: &str, dest_folder_id: &str, dest_label: &str) -> Self {
        Self {
            files: resolution.matched,
            not_found: resolution.not_found,
            source_label: source_label.to_string(),
            dest_folder_id: dest_folder_id.to_string(),
            dest_label: dest_label.to_string(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
