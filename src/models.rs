use serde::Deserialize;

use crate::error::{DriveError, Result};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A `files` item as the Drive API returns it. Every field is optional on the
/// wire; conversion into the typed records below validates what we rely on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFile {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    pub mime_type: Option<String>,
}

/// One page of a `files.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<RawFile>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub display_path: String,
}

fn required(value: Option<String>, field: &'static str, context: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(DriveError::MissingField { field, context })
}

impl TryFrom<RawFile> for FolderRecord {
    type Error = DriveError;

    fn try_from(raw: RawFile) -> Result<Self> {
        Ok(Self {
            id: required(raw.id, "id", "folder record")?,
            name: required(raw.name, "name", "folder record")?,
            parent_id: raw.parents.into_iter().next(),
        })
    }
}

impl FileEntry {
    /// Files are listed per folder, so the folder being listed is the parent
    /// when the response leaves `parents` out.
    pub fn from_raw(raw: RawFile, folder_id: &str) -> Result<Self> {
        Ok(Self {
            id: required(raw.id, "id", "file record")?,
            name: required(raw.name, "name", "file record")?,
            parent_id: raw
                .parents
                .into_iter()
                .next()
                .unwrap_or_else(|| folder_id.to_string()),
            mime_type: raw.mime_type,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().starts_with("image/"))
    }

    pub fn view_url(&self) -> String {
        format!("https://drive.google.com/file/d/{}/view", self.id)
    }
}

/// What the user picked for a single copy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// File ids chosen from the browse list.
    Browse(Vec<String>),
    /// Raw comma-separated names typed by the user.
    Typed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    Copied,
    NotFound,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyResult {
    pub source_name: String,
    pub status: CopyStatus,
    pub new_file_id: Option<String>,
    pub error_detail: Option<String>,
}

impl CopyResult {
    pub fn copied(source_name: &str, new_file_id: String) -> Self {
        Self {
            source_name: source_name.to_string(),
            status: CopyStatus::Copied,
            new_file_id: Some(new_file_id),
            error_detail: None,
        }
    }

    pub fn not_found(token: &str) -> Self {
        Self {
            source_name: token.to_string(),
            status: CopyStatus::NotFound,
            new_file_id: None,
            error_detail: None,
        }
    }

    pub fn failed(source_name: &str, detail: String) -> Self {
        Self {
            source_name: source_name.to_string(),
            status: CopyStatus::Failed,
            new_file_id: None,
            error_detail: Some(detail),
        }
    }

    /// One line for the result log.
    pub fn summary(&self) -> String {
        match self.status {
            CopyStatus::Copied => format!("Copied {}", self.source_name),
            CopyStatus::NotFound => format!("Not found in source folder: {}", self.source_name),
            CopyStatus::Failed => format!(
                "Failed {}: {}",
                self.source_name,
                self.error_detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
