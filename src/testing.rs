//! In-memory `DriveApi` for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{DriveError, Result};
use crate::models::{FilePage, RawFile};
use crate::transport::{DriveApi, ListQuery};

pub fn raw(id: &str, name: &str, parent: Option<&str>) -> RawFile {
    RawFile {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
        mime_type: None,
    }
}

#[derive(Default)]
pub struct FakeDriveApi {
    pub folders: Vec<RawFile>,
    pub files: HashMap<String, Vec<RawFile>>,
    pub failing_copies: HashSet<String>,
    pub unauthorized_copies: HashSet<String>,
    /// Copies that fail with a 503.
    pub transient_copies: HashSet<String>,
    /// Folders whose file listing fails with the given status.
    pub failing_lists: HashMap<String, u16>,
    pub content: HashMap<String, Vec<u8>>,
    /// Number of upcoming read calls that fail with a 503.
    pub read_failures: Mutex<u32>,
    pub list_calls: Mutex<u32>,
    pub copy_attempts: Mutex<u32>,
    pub copies: Mutex<Vec<(String, String, String)>>,
}

impl FakeDriveApi {
    pub fn with_files(folder_id: &str, names: &[&str]) -> Self {
        let files = names
            .iter()
            .enumerate()
            .map(|(i, name)| raw(&format!("file-{i}"), name, Some(folder_id)))
            .collect();
        let mut api = Self::default();
        api.files.insert(folder_id.to_string(), files);
        api
    }

    pub fn copy_count(&self) -> usize {
        self.copies.lock().unwrap().len()
    }

    pub fn list_call_count(&self) -> u32 {
        *self.list_calls.lock().unwrap()
    }

    fn status_error(status: u16) -> DriveError {
        match status {
            401 => DriveError::Unauthorized,
            _ => DriveError::Api {
                status,
                message: "backend unavailable".into(),
            },
        }
    }

    fn take_read_failure(&self) -> Result<()> {
        let mut remaining = self.read_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(DriveError::Api {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(())
    }
}

impl DriveApi for FakeDriveApi {
    fn list_page(
        &self,
        query: &ListQuery,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        *self.list_calls.lock().unwrap() += 1;
        self.take_read_failure()?;
        if let ListQuery::FilesIn(id) = query {
            if let Some(status) = self.failing_lists.get(id) {
                return Err(Self::status_error(*status));
            }
        }
        let all: &[RawFile] = match query {
            ListQuery::Folders => &self.folders,
            ListQuery::FilesIn(id) => self.files.get(id).map(Vec::as_slice).unwrap_or(&[]),
        };
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + page_size as usize).min(all.len());
        Ok(FilePage {
            files: all[start..end].to_vec(),
            next_page_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    fn copy_file(&self, file_id: &str, name: &str, dest_folder_id: &str) -> Result<String> {
        *self.copy_attempts.lock().unwrap() += 1;
        if self.transient_copies.contains(file_id) {
            return Err(DriveError::Api {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        if self.unauthorized_copies.contains(file_id) {
            return Err(DriveError::Unauthorized);
        }
        if self.failing_copies.contains(file_id) {
            return Err(DriveError::Api {
                status: 403,
                message: "insufficient permissions".into(),
            });
        }
        let mut copies = self.copies.lock().unwrap();
        copies.push((file_id.to_string(), name.to_string(), dest_folder_id.to_string()));
        Ok(format!("copy-{}", copies.len()))
    }

    fn file_metadata(&self, file_id: &str) -> Result<RawFile> {
        self.take_read_failure()?;
        self.files
            .values()
            .flatten()
            .find(|f| f.id.as_deref() == Some(file_id))
            .cloned()
            .ok_or(DriveError::Api {
                status: 404,
                message: format!("File not found: {file_id}"),
            })
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.take_read_failure()?;
        Ok(self.content.get(file_id).cloned().unwrap_or_default())
    }
}
