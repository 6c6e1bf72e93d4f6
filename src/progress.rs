use crate::models::{CopyResult, CopyStatus};

#[derive(Clone, Default)]
pub struct ProgressInfo {
    pub message: String,
    pub total_files: usize,
    pub done_files: usize,
    pub copied: usize,
    pub failed: usize,
    pub current_file: String,
    pub running: bool,
}

impl ProgressInfo {
    pub fn start(total_files: usize, dest_label: &str) -> Self {
        Self {
            message: format!("Copying {} file(s) to {}...", total_files, dest_label),
            total_files,
            running: true,
            ..Self::default()
        }
    }

    pub fn record(&mut self, done: usize, total: usize, result: &CopyResult) {
        self.done_files = done;
        self.total_files = total;
        self.current_file = result.source_name.clone();
        match result.status {
            CopyStatus::Copied => self.copied += 1,
            CopyStatus::Failed => self.failed += 1,
            CopyStatus::NotFound => {}
        }
        self.message = format!("Copying {}/{}...", done, total);
    }

    pub fn finish(&mut self, dest_label: &str) {
        self.running = false;
        self.message = if self.failed == 0 {
            format!("Copied {} file(s) to {}.", self.copied, dest_label)
        } else {
            format!(
                "Copied {} file(s) to {}, {} failed.",
                self.copied, dest_label, self.failed
            )
        };
    }

    pub fn fraction(&self) -> f32 {
        if self.total_files == 0 { 0.0 } else { self.done_files as f32 / self.total_files as f32 }
    }
}
