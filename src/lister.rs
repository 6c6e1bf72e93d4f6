use tracing::{debug, info};

use crate::error::Result;
use crate::models::{FileEntry, FolderRecord, RawFile};
use crate::transport::{DriveApi, ListQuery};

/// Follow continuation tokens until the provider stops returning one and
/// return every item in page order.
pub fn list_all(api: &dyn DriveApi, query: &ListQuery, page_size: u32) -> Result<Vec<RawFile>> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let page = api.list_page(query, page_size, page_token.as_deref())?;
        pages += 1;
        items.extend(page.files);
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    debug!(?query, pages, items = items.len(), "listing complete");
    Ok(items)
}

pub fn list_folders(api: &dyn DriveApi, page_size: u32) -> Result<Vec<FolderRecord>> {
    let folders = list_all(api, &ListQuery::Folders, page_size)?
        .into_iter()
        .map(FolderRecord::try_from)
        .collect::<Result<Vec<_>>>()?;
    info!("listed {} folders", folders.len());
    Ok(folders)
}

pub fn list_files_in_folder(
    api: &dyn DriveApi,
    folder_id: &str,
    page_size: u32,
) -> Result<Vec<FileEntry>> {
    let files = list_all(api, &ListQuery::FilesIn(folder_id.to_string()), page_size)?
        .into_iter()
        .map(|raw| FileEntry::from_raw(raw, folder_id))
        .collect::<Result<Vec<_>>>()?;
    info!(folder_id, "listed {} files", files.len());
    Ok(files)
}
