use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::transport::{MAX_PAGE_SIZE, TransportConfig};
use crate::tree::DEFAULT_ROOT_LABEL;

const CONFIG_FILE: &str = "config.json";
const TOKEN_FILE: &str = "token.json";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "example", "DriveCopy")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last chosen folders, restored on the next start.
    pub source_folder_id: Option<String>,
    pub dest_folder_id: Option<String>,
    /// Defaults to `token.json` next to the config file.
    pub token_path: Option<PathBuf>,
    pub page_size: u32,
    /// Unset keeps the HTTP client's default timeout.
    pub timeout_secs: Option<u64>,
    /// Retries for folder and file listings; copies are never retried.
    pub max_retries: u32,
    pub root_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_folder_id: None,
            dest_folder_id: None,
            token_path: None,
            page_size: MAX_PAGE_SIZE,
            timeout_secs: None,
            max_retries: 0,
            root_label: DEFAULT_ROOT_LABEL.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        if let Some(proj_dirs) = project_dirs() {
            let path = proj_dirs.config_dir().join(CONFIG_FILE);
            if let Ok(data) = fs::read_to_string(&path) {
                return Self::parse(&data).unwrap_or_else(|e| {
                    warn!("ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                });
            }
            debug!("no config at {}, using defaults", path.display());
        }
        Self::default()
    }

    pub fn parse(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    pub fn save(&self) {
        let Some(proj_dirs) = project_dirs() else {
            return;
        };
        let config_dir = proj_dirs.config_dir();
        if let Err(e) = fs::create_dir_all(config_dir) {
            warn!("cannot create {}: {}", config_dir.display(), e);
            return;
        }
        let path = config_dir.join(CONFIG_FILE);
        match serde_json::to_string_pretty(self) {
            Ok(data) => {
                if let Err(e) = fs::write(&path, data) {
                    warn!("cannot write {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("cannot serialize config: {}", e),
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|d| d.config_dir().join(TOKEN_FILE))
                .unwrap_or_else(|| PathBuf::from(TOKEN_FILE))
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..TransportConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }
}
