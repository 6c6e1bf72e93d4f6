use tracing::{info, warn};

use crate::copy_request::CopyRequest;
use crate::models::{CopyResult, CopyStatus, FileEntry};
use crate::transport::DriveApi;

/// Duplicate `files` into `dest_folder_id` one at a time, keeping each
/// file's name. A failed file is recorded and the next one is still tried.
/// After an authorization failure the rest are reported without sending
/// requests that would fail the same way.
///
/// `on_item` is called after every file with `(done, total, result)`.
pub fn copy_files(
    api: &dyn DriveApi,
    files: &[FileEntry],
    dest_folder_id: &str,
    mut on_item: impl FnMut(usize, usize, &CopyResult),
) -> Vec<CopyResult> {
    let total = files.len();
    let mut results = Vec::with_capacity(total);
    let mut fatal: Option<String> = None;
    for (i, file) in files.iter().enumerate() {
        let result = match &fatal {
            Some(reason) => CopyResult::failed(&file.name, format!("not attempted: {reason}")),
            None => match api.copy_file(&file.id, &file.name, dest_folder_id) {
                Ok(new_id) => {
                    info!(file = %file.name, new_id = %new_id, "copied");
                    CopyResult::copied(&file.name, new_id)
                }
                Err(err) => {
                    warn!(file = %file.name, error = %err, "copy failed");
                    if err.is_fatal() {
                        fatal = Some(err.to_string());
                    }
                    CopyResult::failed(&file.name, err.to_string())
                }
            },
        };
        on_item(i + 1, total, &result);
        results.push(result);
    }
    results
}

/// Run a confirmed request. Names that did not resolve come first as
/// not-found results, followed by one result per copied file.
pub fn execute(
    api: &dyn DriveApi,
    request: &CopyRequest,
    on_item: impl FnMut(usize, usize, &CopyResult),
) -> Vec<CopyResult> {
    let mut results: Vec<CopyResult> = request
        .not_found
        .iter()
        .map(|token| CopyResult::not_found(token))
        .collect();
    results.extend(copy_files(api, &request.files, &request.dest_folder_id, on_item));
    let copied = results
        .iter()
        .filter(|r| r.status == CopyStatus::Copied)
        .count();
    info!(
        copied,
        requested = results.len(),
        dest = %request.dest_label,
        "copy finished"
    );
    results
}
