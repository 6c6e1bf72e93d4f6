//! State carried across interactions: the folder tree, the chosen folders
//! and the file listing of the current source folder.

use tracing::debug;

use crate::error::Result;
use crate::models::{FileEntry, Selection};
use crate::resolve::{self, Resolution};
use crate::tree::{FolderTree, ROOT_ID};

/// Files of one folder, tagged with the folder they came from.
#[derive(Debug, Clone)]
struct FileListing {
    folder_id: String,
    files: Vec<FileEntry>,
}

#[derive(Debug, Default)]
pub struct Session {
    tree: Option<FolderTree>,
    source_folder: Option<String>,
    dest_folder: Option<String>,
    listing: Option<FileListing>,
    /// Folder id and message of the last failed listing.
    listing_error: Option<(String, String)>,
}

impl Session {
    pub fn new(source_folder: Option<String>, dest_folder: Option<String>) -> Self {
        Self {
            source_folder,
            dest_folder,
            ..Self::default()
        }
    }

    pub fn tree(&self) -> Option<&FolderTree> {
        self.tree.as_ref()
    }

    pub fn needs_tree(&self) -> bool {
        self.tree.is_none()
    }

    /// Replace the folder tree. Selections pointing at folders that no
    /// longer exist fall back to the root.
    pub fn install_tree(&mut self, tree: FolderTree) {
        for selected in [&mut self.source_folder, &mut self.dest_folder] {
            if selected.as_deref().is_some_and(|id| !tree.contains(id)) {
                debug!(folder = ?selected, "selected folder no longer listed");
                *selected = None;
            }
        }
        self.tree = Some(tree);
        if self
            .listing
            .as_ref()
            .is_some_and(|l| l.folder_id != self.source_folder())
        {
            self.listing = None;
        }
        if self.files_error().is_none() {
            self.listing_error = None;
        }
    }

    pub fn refresh_tree(&mut self) {
        self.tree = None;
    }

    pub fn source_folder(&self) -> &str {
        self.source_folder.as_deref().unwrap_or(ROOT_ID)
    }

    pub fn dest_folder(&self) -> &str {
        self.dest_folder.as_deref().unwrap_or(ROOT_ID)
    }

    /// Changing the source drops the listing of the previous folder.
    pub fn select_source(&mut self, folder_id: &str) {
        if self.source_folder() != folder_id {
            self.source_folder = Some(folder_id.to_string());
            self.listing = None;
            self.listing_error = None;
        }
    }

    pub fn select_dest(&mut self, folder_id: &str) {
        self.dest_folder = Some(folder_id.to_string());
    }

    pub fn same_source_and_dest(&self) -> bool {
        self.source_folder() == self.dest_folder()
    }

    /// Files of the current source folder, if they are loaded.
    pub fn source_files(&self) -> Option<&[FileEntry]> {
        self.listing
            .as_ref()
            .filter(|l| l.folder_id == self.source_folder())
            .map(|l| l.files.as_slice())
    }

    /// Why the current source folder has no listing, if its load failed.
    pub fn files_error(&self) -> Option<&str> {
        self.listing_error
            .as_ref()
            .filter(|(folder_id, _)| folder_id == self.source_folder())
            .map(|(_, message)| message.as_str())
    }

    /// True while the source folder has neither a listing nor a failure.
    pub fn needs_files(&self) -> bool {
        self.source_files().is_none() && self.files_error().is_none()
    }

    /// Store the outcome of listing `folder_id`. An outcome for a folder
    /// that is no longer the source (the user switched while it loaded) is
    /// dropped and `false` returned.
    pub fn install_listing(&mut self, folder_id: String, outcome: Result<Vec<FileEntry>>) -> bool {
        if folder_id != self.source_folder() {
            debug!(folder = %folder_id, "dropping listing of a previous source folder");
            return false;
        }
        match outcome {
            Ok(files) => {
                self.listing = Some(FileListing { folder_id, files });
                self.listing_error = None;
            }
            Err(err) => {
                self.listing = None;
                self.listing_error = Some((folder_id, err.to_string()));
            }
        }
        true
    }

    pub fn refresh_files(&mut self) {
        self.listing = None;
        self.listing_error = None;
    }

    /// Resolve a selection against the loaded source listing. Without a
    /// listing every requested item is reported as not found.
    pub fn resolve(&self, selection: &Selection) -> Resolution {
        let files = self.source_files().unwrap_or(&[]);
        match selection {
            Selection::Browse(ids) => resolve::select_by_ids(ids, files),
            Selection::Typed(csv) => resolve::resolve_names(csv, files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriveError;
    use crate::lister::{list_files_in_folder, list_folders};
    use crate::testing::{FakeDriveApi, raw};
    use crate::tree::DEFAULT_ROOT_LABEL;

    fn api() -> FakeDriveApi {
        let mut api = FakeDriveApi::with_files("src", &["a.jpg", "b.JPG"]);
        api.files
            .insert("other".into(), vec![raw("o1", "other.png", Some("other"))]);
        api.folders = vec![raw("src", "Source", None), raw("other", "Other", None)];
        api
    }

    fn tree(api: &FakeDriveApi) -> FolderTree {
        FolderTree::build(list_folders(api, 1000).unwrap(), DEFAULT_ROOT_LABEL)
    }

    fn load(session: &mut Session, api: &FakeDriveApi, folder_id: &str) -> bool {
        let outcome = list_files_in_folder(api, folder_id, 1000);
        session.install_listing(folder_id.to_string(), outcome)
    }

    fn unavailable() -> DriveError {
        DriveError::Api {
            status: 503,
            message: "backend unavailable".into(),
        }
    }

    #[test]
    fn refresh_tree_forces_a_rebuild() {
        let api = api();
        let mut session = Session::default();
        assert!(session.needs_tree());
        session.install_tree(tree(&api));
        assert_eq!(session.tree().unwrap().len(), 3);
        session.refresh_tree();
        assert!(session.needs_tree());
    }

    #[test]
    fn listing_belongs_to_its_source_folder() {
        let api = api();
        let mut session = Session::default();
        session.select_source("src");
        assert!(load(&mut session, &api, "src"));
        assert_eq!(session.source_files().unwrap().len(), 2);
        assert!(!session.needs_files());

        session.select_source("other");
        assert!(session.needs_files());
        assert!(load(&mut session, &api, "other"));
        let names: Vec<_> = session
            .source_files()
            .unwrap()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, ["other.png"]);
    }

    #[test]
    fn reselecting_the_source_keeps_the_listing() {
        let api = api();
        let mut session = Session::default();
        session.select_source("src");
        load(&mut session, &api, "src");
        session.select_source("src");
        assert!(session.source_files().is_some());
    }

    #[test]
    fn refresh_drops_listing_and_error() {
        let api = api();
        let mut session = Session::default();
        session.select_source("src");
        load(&mut session, &api, "src");
        session.refresh_files();
        assert!(session.source_files().is_none());
        assert!(session.needs_files());

        session.install_listing("src".into(), Err(unavailable()));
        session.refresh_files();
        assert_eq!(session.files_error(), None);
        assert!(session.needs_files());
    }

    #[test]
    fn stale_listing_is_not_installed() {
        let mut session = Session::default();
        session.select_source("src");
        assert!(!session.install_listing("other".into(), Ok(Vec::new())));
        assert!(session.needs_files());
    }

    #[test]
    fn failed_listing_is_reported_for_its_folder() {
        let mut session = Session::default();
        session.select_source("src");
        assert!(session.install_listing("src".into(), Err(unavailable())));
        assert_eq!(
            session.files_error(),
            Some("Drive API returned 503: backend unavailable")
        );
        assert!(!session.needs_files());
        assert!(session.source_files().is_none());
    }

    #[test]
    fn failure_of_a_previous_source_does_not_block_the_new_one() {
        let mut session = Session::default();
        session.select_source("src");
        session.select_source("other");
        assert!(!session.install_listing("src".into(), Err(unavailable())));
        assert_eq!(session.files_error(), None);
        assert!(session.needs_files());
    }

    #[test]
    fn switching_away_from_a_failed_folder_clears_the_error() {
        let mut session = Session::default();
        session.select_source("src");
        session.install_listing("src".into(), Err(unavailable()));
        session.select_source("other");
        assert_eq!(session.files_error(), None);
        assert!(session.needs_files());
    }

    #[test]
    fn vanished_folders_fall_back_to_root() {
        let mut session = Session::new(Some("gone".into()), Some("src".into()));
        session.install_tree(tree(&api()));
        assert_eq!(session.source_folder(), ROOT_ID);
        assert_eq!(session.dest_folder(), "src");
    }

    #[test]
    fn resolves_typed_and_browsed_selections() {
        let api = api();
        let mut session = Session::default();
        session.select_source("src");
        load(&mut session, &api, "src");

        let typed = session.resolve(&Selection::Typed("B, missing".into()));
        assert_eq!(typed.matched[0].name, "b.JPG");
        assert_eq!(typed.not_found, ["missing"]);

        let browsed = session.resolve(&Selection::Browse(vec!["file-0".into()]));
        assert_eq!(browsed.matched[0].name, "a.jpg");
    }

    #[test]
    fn same_folder_is_detected() {
        let mut session = Session::default();
        assert!(session.same_source_and_dest());
        session.select_dest("src");
        assert!(!session.same_source_and_dest());
    }
}
