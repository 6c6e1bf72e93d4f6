use crate::auth::{AccessToken, TOKEN_ENV_VAR};
use crate::config::Config;
use crate::copy;
use crate::copy_request::CopyRequest;
use crate::error::{DriveError, Result};
use crate::lister;
use crate::models::{CopyResult, CopyStatus, FileEntry, Selection};
use crate::progress::ProgressInfo;
use crate::resolve;
use crate::retry::RetryingDriveApi;
use crate::session::Session;
use crate::transport::{DriveApi, HttpDriveApi};
use crate::tree::FolderTree;
use eframe::egui::{self, CentralPanel, Color32, Context, TextEdit, TopBottomPanel};
use eframe::App;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const PREVIEW_SIZE: u32 = 480;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn connect(config: &Config) -> Result<Arc<dyn DriveApi>> {
    let token = AccessToken::load(std::env::var(TOKEN_ENV_VAR).ok(), &config.token_path())?;
    let http = HttpDriveApi::new(&config.transport(), token)?;
    Ok(Arc::new(RetryingDriveApi::new(http, config.retry_policy())))
}

/// Background work whose output is picked up by a later frame.
struct Job<T> {
    slot: Arc<Mutex<Option<T>>>,
    running: bool,
}

impl<T> Default for Job<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            running: false,
        }
    }
}

impl<T: Send + 'static> Job<T> {
    fn spawn(&mut self, ctx: &Context, work: impl FnOnce() -> T + Send + 'static) {
        self.running = true;
        let slot = self.slot.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let result = work();
            *lock(&slot) = Some(result);
            ctx.request_repaint();
        });
    }

    fn poll(&mut self) -> Option<T> {
        let result = lock(&self.slot).take();
        if result.is_some() {
            self.running = false;
        }
        result
    }
}

pub struct Preview {
    pub file: FileEntry,
    pub image: Option<egui::ColorImage>,
}

/// Fetch what the preview panel shows for `file`: a downscaled image for
/// image files, nothing but the link for everything else.
pub fn load_preview(api: &dyn DriveApi, mut file: FileEntry) -> Result<Preview> {
    if file.mime_type.is_none() {
        file.mime_type = api.file_metadata(&file.id)?.mime_type;
    }
    if !file.is_image() {
        return Ok(Preview { file, image: None });
    }
    let bytes = api.download(&file.id)?;
    let image = match image::load_from_memory(&bytes) {
        Ok(img) => {
            let img = if img.width() > PREVIEW_SIZE || img.height() > PREVIEW_SIZE {
                img.thumbnail(PREVIEW_SIZE, PREVIEW_SIZE)
            } else {
                img
            };
            let img = img.to_rgba8();
            let size = [img.width() as usize, img.height() as usize];
            Some(egui::ColorImage::from_rgba_unmultiplied(
                size,
                img.as_flat_samples().as_slice(),
            ))
        }
        Err(e) => {
            warn!(file = %file.name, "cannot decode preview: {}", e);
            None
        }
    };
    Ok(Preview { file, image })
}

/// Browse picks win over typed names; `None` when neither holds anything.
pub fn selection_from(use_browse: bool, selected_ids: &[String], typed_names: &str) -> Option<Selection> {
    if use_browse && !selected_ids.is_empty() {
        return Some(Selection::Browse(selected_ids.to_vec()));
    }
    if resolve::parse_name_tokens(typed_names).is_empty() {
        return None;
    }
    Some(Selection::Typed(typed_names.to_string()))
}

fn folder_combo(
    ui: &mut egui::Ui,
    label: &str,
    entries: &[(String, String)],
    current: &str,
    current_label: &str,
) -> Option<String> {
    let mut picked = None;
    egui::ComboBox::from_label(label)
        .selected_text(current_label)
        .width(420.0)
        .show_ui(ui, |ui| {
            for (path, id) in entries {
                if ui.selectable_label(id == current, path.as_str()).clicked() && id != current {
                    picked = Some(id.clone());
                }
            }
        });
    picked
}

pub struct DriveCopyApp {
    config: Config,
    api: Option<Arc<dyn DriveApi>>,
    auth_error: Option<String>,
    session: Session,
    tree_job: Job<Result<FolderTree>>,
    tree_error: Option<String>,
    /// Output is tagged with the folder it lists.
    files_job: Job<(String, Result<Vec<FileEntry>>)>,
    preview_job: Job<Result<Preview>>,
    preview_requested: Option<String>,
    preview: Option<Preview>,
    preview_texture: Option<egui::TextureHandle>,
    preview_error: Option<String>,
    use_browse: bool,
    filter_text: String,
    selected_ids: Vec<String>,
    typed_names: String,
    notice: Option<String>,
    progress: Arc<Mutex<ProgressInfo>>, // shared with the copy thread
    logs: Arc<Mutex<Vec<String>>>,
    results: Arc<Mutex<Vec<CopyResult>>>,
    pending_copy: Option<CopyRequest>,
}

impl DriveCopyApp {
    pub fn new(config: Config) -> Self {
        let mut app = Self::disconnected(config);
        app.reconnect();
        app
    }

    fn disconnected(config: Config) -> Self {
        let session = Session::new(config.source_folder_id.clone(), config.dest_folder_id.clone());
        Self {
            config,
            api: None,
            auth_error: None,
            session,
            tree_job: Job::default(),
            tree_error: None,
            files_job: Job::default(),
            preview_job: Job::default(),
            preview_requested: None,
            preview: None,
            preview_texture: None,
            preview_error: None,
            use_browse: true,
            filter_text: String::new(),
            selected_ids: Vec::new(),
            typed_names: String::new(),
            notice: None,
            progress: Arc::new(Mutex::new(ProgressInfo::default())),
            logs: Arc::new(Mutex::new(Vec::new())),
            results: Arc::new(Mutex::new(Vec::new())),
            pending_copy: None,
        }
    }

    fn reconnect(&mut self) {
        match connect(&self.config) {
            Ok(api) => {
                info!("connected to Google Drive");
                self.api = Some(api);
                self.auth_error = None;
                self.tree_error = None;
                self.session.refresh_tree();
                self.session.refresh_files();
            }
            Err(e) => {
                warn!("not connected: {}", e);
                self.api = None;
                self.auth_error = Some(e.to_string());
            }
        }
    }

    fn log(&self, line: String) {
        lock(&self.logs).push(line);
    }

    /// The token was rejected; go back to the connect screen.
    fn disconnect(&mut self, err: &DriveError) {
        error!("Drive rejected the access token: {}", err);
        self.api = None;
        self.auth_error = Some(err.to_string());
    }

    /// Install a finished listing. Browse picks missing from a fresh listing
    /// of the source folder are dropped.
    fn on_files_loaded(&mut self, folder_id: String, outcome: Result<Vec<FileEntry>>) {
        match &outcome {
            Err(e) if e.is_fatal() => {
                self.disconnect(e);
                return;
            }
            Err(e) => error!(folder = %folder_id, "file listing failed: {}", e),
            Ok(_) => {}
        }
        if !self.session.install_listing(folder_id, outcome) {
            return;
        }
        let Some(files) = self.session.source_files() else {
            return;
        };
        let ids: HashSet<&str> = files.iter().map(|f| f.id.as_str()).collect();
        let before = self.selected_ids.len();
        self.selected_ids.retain(|id| ids.contains(id.as_str()));
        let dropped = before - self.selected_ids.len();
        self.log(format!("Loaded {} file(s)", files.len()));
        if dropped > 0 {
            self.log(format!("{dropped} selected file(s) are no longer in the folder"));
        }
    }

    fn poll_jobs(&mut self, ctx: &Context) {
        if let Some(result) = self.tree_job.poll() {
            match result {
                Ok(tree) => {
                    self.log(format!("Loaded {} folder(s)", tree.len().saturating_sub(1)));
                    self.session.install_tree(tree);
                }
                Err(e) if e.is_fatal() => self.disconnect(&e),
                Err(e) => {
                    error!("folder listing failed: {}", e);
                    self.tree_error = Some(format!("Failed to load folder structure: {e}"));
                }
            }
        }

        if let Some((folder_id, outcome)) = self.files_job.poll() {
            self.on_files_loaded(folder_id, outcome);
        }

        if let Some(result) = self.preview_job.poll() {
            match result {
                Ok(mut preview) => {
                    self.preview_texture = preview
                        .image
                        .take()
                        .map(|img| ctx.load_texture("preview", img, Default::default()));
                    self.preview = Some(preview);
                    self.preview_error = None;
                }
                Err(e) => {
                    self.preview = None;
                    self.preview_texture = None;
                    self.preview_error = Some(format!("Preview unavailable: {e}"));
                }
            }
        }
    }

    fn spawn_loads(&mut self, ctx: &Context) {
        let Some(api) = self.api.clone() else {
            return;
        };
        let page_size = self.config.page_size();

        if self.session.needs_tree() && !self.tree_job.running && self.tree_error.is_none() {
            let api = api.clone();
            let root_label = self.config.root_label.clone();
            self.tree_job.spawn(ctx, move || {
                let folders = lister::list_folders(api.as_ref(), page_size)?;
                Ok(FolderTree::build(folders, &root_label))
            });
        }

        if self.session.tree().is_some() && self.session.needs_files() && !self.files_job.running {
            let api = api.clone();
            let folder_id = self.session.source_folder().to_string();
            debug!(folder = %folder_id, "listing source folder");
            self.files_job.spawn(ctx, move || {
                let outcome = lister::list_files_in_folder(api.as_ref(), &folder_id, page_size);
                (folder_id, outcome)
            });
        }

        let latest = self
            .use_browse
            .then(|| self.selected_ids.last().cloned())
            .flatten();
        if latest.is_none() {
            self.preview_requested = None;
            self.preview = None;
            self.preview_texture = None;
            self.preview_error = None;
        } else if latest != self.preview_requested && !self.preview_job.running {
            let file = latest.as_deref().and_then(|id| {
                self.session
                    .source_files()
                    .and_then(|files| files.iter().find(|f| f.id == id).cloned())
            });
            if let Some(file) = file {
                self.preview_requested = latest;
                self.preview_job.spawn(ctx, move || load_preview(api.as_ref(), file));
            }
        }
    }

    fn auth_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Connect Google Drive");
        ui.label(format!(
            "Provide an OAuth access token with the Drive scope in the {} environment variable or in {}.",
            TOKEN_ENV_VAR,
            self.config.token_path().display()
        ));
        if let Some(err) = &self.auth_error {
            ui.colored_label(Color32::RED, err.as_str());
        }
        if ui.button("Connect Google Drive").clicked() {
            self.reconnect();
        }
    }

    fn main_ui(&mut self, ui: &mut egui::Ui) {
        let Some(tree) = self.session.tree() else {
            if let Some(err) = &self.tree_error {
                ui.colored_label(Color32::RED, err.as_str());
                if ui.button("Retry").clicked() {
                    self.tree_error = None;
                }
            } else {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading folder structure...");
                });
            }
            return;
        };
        if tree.is_empty() {
            ui.colored_label(Color32::YELLOW, "No folders found in your Drive.");
        }
        let entries: Vec<(String, String)> = tree
            .entries()
            .map(|(path, id)| (path.to_string(), id.to_string()))
            .collect();
        let source_id = self.session.source_folder().to_string();
        let dest_id = self.session.dest_folder().to_string();
        let source_label = tree.path_for_id(&source_id).unwrap_or_default().to_string();
        let dest_label = tree.path_for_id(&dest_id).unwrap_or_default().to_string();

        ui.label("Select a folder by its full path (expand the dropdown to see the full structure).");
        if let Some(id) = folder_combo(ui, "Source folder", &entries, &source_id, &source_label) {
            self.session.select_source(&id);
            self.selected_ids.clear();
            self.config.source_folder_id = Some(id);
            self.config.save();
        }

        ui.separator();
        ui.heading("Choose files to copy");
        ui.horizontal(|ui| {
            ui.checkbox(&mut self.use_browse, "Browse and select from folder (recommended)");
            if ui
                .button("Refresh file list")
                .on_hover_text("Reload the list to include newly added files")
                .clicked()
            {
                self.session.refresh_files();
            }
        });
        if self.use_browse {
            self.browse_ui(ui, &source_label);
            self.preview_ui(ui);
        }

        ui.label("Or type file names (comma-separated)");
        ui.add(
            TextEdit::multiline(&mut self.typed_names)
                .hint_text("e.g. report.pdf, 7B1A0431.JPG")
                .desired_rows(3),
        );

        ui.separator();
        if let Some(id) = folder_combo(ui, "Destination folder", &entries, &dest_id, &dest_label) {
            self.session.select_dest(&id);
            self.config.dest_folder_id = Some(id);
            self.config.save();
        }
        if self.session.same_source_and_dest() {
            ui.colored_label(
                Color32::YELLOW,
                "Source and destination are the same folder. Copies will appear in the same folder.",
            );
        }

        let running = lock(&self.progress).running;
        if ui
            .add_enabled(!running && self.pending_copy.is_none(), egui::Button::new("Copy files"))
            .clicked()
        {
            self.prepare_copy(&source_label, &dest_label);
        }
        if let Some(notice) = &self.notice {
            ui.colored_label(Color32::YELLOW, notice.as_str());
        }

        self.progress_ui(ui);
    }

    fn browse_ui(&mut self, ui: &mut egui::Ui, source_label: &str) {
        let Some(files) = self.session.source_files() else {
            if let Some(err) = self.session.files_error() {
                ui.colored_label(Color32::RED, format!("Failed to list files: {err}"));
                ui.label("Click Refresh file list to try again, or type names below.");
            } else {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading files...");
                });
            }
            return;
        };
        if files.is_empty() {
            ui.label("No files in this folder. Click Refresh file list or type names below.");
            return;
        }
        ui.label(format!(
            "Loaded {} file(s) from {}. Use Refresh file list to reload.",
            files.len(),
            source_label
        ));
        ui.add(
            TextEdit::singleline(&mut self.filter_text)
                .hint_text("Filter by name, e.g. 7B1A or .JPG"),
        );
        let visible: HashSet<&str> = resolve::filter_by_substring(files, &self.filter_text)
            .into_iter()
            .map(|f| f.id.as_str())
            .collect();
        if !self.filter_text.trim().is_empty() {
            ui.label(format!("{} file(s) match your filter.", visible.len()));
        }
        let selected_ids = &mut self.selected_ids;
        egui::ScrollArea::vertical()
            .id_source("file_list")
            .max_height(240.0)
            .show(ui, |ui| {
                for (label, file) in resolve::browse_labels(files) {
                    if !visible.contains(file.id.as_str()) {
                        continue;
                    }
                    let mut checked = selected_ids.contains(&file.id);
                    if ui.checkbox(&mut checked, label).changed() {
                        if checked {
                            selected_ids.push(file.id.clone());
                        } else {
                            selected_ids.retain(|id| *id != file.id);
                        }
                    }
                }
            });
        if !self.selected_ids.is_empty() {
            ui.label(format!("{} file(s) selected.", self.selected_ids.len()));
        }
    }

    fn preview_ui(&mut self, ui: &mut egui::Ui) {
        if self.selected_ids.is_empty() {
            return;
        }
        ui.separator();
        ui.label("Preview: latest selected file");
        if self.preview_job.running {
            ui.spinner();
        }
        if let Some(err) = &self.preview_error {
            ui.label(err.as_str());
            return;
        }
        let Some(preview) = &self.preview else {
            return;
        };
        ui.strong(preview.file.name.as_str());
        if let Some(tex) = &self.preview_texture {
            let max = 240.0;
            let size = tex.size_vec2();
            let scale = (max / size.x).min(max / size.y).min(1.0);
            ui.add(egui::Image::from_texture(tex).fit_to_exact_size(size * scale));
        } else if preview.file.is_image() {
            ui.label("Could not load image preview.");
        }
        ui.hyperlink_to("Open in Google Drive", preview.file.view_url());
    }

    fn progress_ui(&mut self, ui: &mut egui::Ui) {
        let progress = lock(&self.progress).clone();
        if progress.running || progress.total_files > 0 {
            ui.separator();
            ui.label(progress.message.clone());
            ui.add(egui::ProgressBar::new(progress.fraction()).show_percentage());
        }

        let results = lock(&self.results).clone();
        if !results.is_empty() {
            ui.label("Results:");
            for result in &results {
                let color = match result.status {
                    CopyStatus::Copied => Color32::GREEN,
                    CopyStatus::NotFound => Color32::YELLOW,
                    CopyStatus::Failed => Color32::RED,
                };
                ui.colored_label(color, result.summary());
            }
        }

        ui.separator();
        let logs = lock(&self.logs);
        egui::ScrollArea::vertical()
            .id_source("log_panel")
            .max_height(150.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for log in logs.iter() {
                    ui.label(log.as_str());
                }
            });
    }

    fn prepare_copy(&mut self, source_label: &str, dest_label: &str) {
        self.notice = None;
        let Some(selection) = selection_from(self.use_browse, &self.selected_ids, &self.typed_names) else {
            self.notice = Some(
                "Select at least one file from the list above, or enter file names (comma-separated)."
                    .into(),
            );
            return;
        };
        if let Some(err) = self.session.files_error() {
            self.notice = Some(format!(
                "Failed to list files: {err}\nClick Refresh file list to try again."
            ));
            return;
        }
        if self.session.needs_files() {
            self.notice = Some("The file list is still loading, try again in a moment.".into());
            return;
        }
        let resolution = self.session.resolve(&selection);
        if resolution.matched.is_empty() {
            let mut notice = String::from("No files matched in the source folder. Check the names and try again.");
            if !resolution.not_found.is_empty() {
                notice.push_str(&format!("\nNot found: {}", resolution.not_found.join(", ")));
            }
            self.notice = Some(notice);
            return;
        }
        self.pending_copy = Some(CopyRequest::new(
            resolution,
            source_label,
            self.session.dest_folder(),
            dest_label,
        ));
    }

    fn start_copy(&mut self, ctx: &Context, request: CopyRequest) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.log(format!(
            "Starting copy from {} to {}",
            request.source_label, request.dest_label
        ));
        *lock(&self.progress) = ProgressInfo::start(request.file_count(), &request.dest_label);
        lock(&self.results).clear();

        let progress = self.progress.clone();
        let logs = self.logs.clone();
        let results = self.results.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let outcome = copy::execute(api.as_ref(), &request, |done, total, result| {
                lock(&progress).record(done, total, result);
                lock(&logs).push(result.summary());
                ctx.request_repaint();
            });
            *lock(&results) = outcome;
            lock(&progress).finish(&request.dest_label);
            ctx.request_repaint();
        });
    }

    fn confirm_window(&mut self, ctx: &Context) {
        let Some(request) = self.pending_copy.clone() else {
            return;
        };
        let mut start_copy = false;
        let mut cancel = false;
        egui::Window::new("Confirm Copy")
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label(format!("Copy from: {}", request.source_label));
                ui.label(format!("Copy to: {}", request.dest_label));
                ui.label(format!("Files to copy: {}", request.file_count()));
                if !request.not_found.is_empty() {
                    ui.colored_label(
                        Color32::YELLOW,
                        format!(
                            "Some names were not found in the source folder: {}",
                            request.not_found.join(", ")
                        ),
                    );
                }
                ui.horizontal(|ui| {
                    if ui.button("Start").clicked() {
                        start_copy = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                });
            });

        if cancel {
            self.pending_copy = None;
        }
        if start_copy {
            self.pending_copy = None;
            self.start_copy(ctx, request);
        }
    }
}

impl App for DriveCopyApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.poll_jobs(ctx);
        self.spawn_loads(ctx);

        TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Google Drive File Copy");
                if self.api.is_some() && ui.button("Refresh folders").clicked() {
                    self.session.refresh_tree();
                    self.tree_error = None;
                }
            });
            ui.label("Copy selected files from one folder to another. Browse and select files, or type their names.");
        });

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                if self.api.is_none() {
                    self.auth_ui(ui);
                } else {
                    self.main_ui(ui);
                }
                ui.separator();
                ui.small("Source files are unchanged; copies are created in the destination folder.");
            });
        });

        self.confirm_window(ctx);

        if lock(&self.progress).running {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}
