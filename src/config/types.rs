use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::tools::LockProbe;

/// 預設設定檔名稱（位於目前工作目錄）
pub const DEFAULT_SETTINGS_FILE: &str = "organizer_settings.json";
pub const DEFAULT_STATE_FILE: &str = ".file_organizer_state.json";
pub const DEFAULT_BATCH_PREFIX: &str = "Session";

const DEFAULT_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".raw", ".dng", ".tiff", ".gif", ".bmp", ".mp4", ".mov", ".avi",
    ".psd", ".ai",
];

/// 穩定性檢查方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityMode {
    /// 兩次掃描的檔案總數相同即視為穩定
    #[default]
    Count,
    /// 除了總數，兩次掃描的檔案路徑集合也必須相同
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no allowed file extensions configured")]
    NoExtensions,
    #[error("destination base folder is not set")]
    MissingDestination,
    #[error("path configured more than once: {}", .0.display())]
    DuplicatePath(PathBuf),
    #[error("{} is inside {}", inner.display(), outer.display())]
    NestedPath { inner: PathBuf, outer: PathBuf },
}

/// 整理器設定
///
/// 每個循環開始時取一份快照，循環進行中不會改變。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_folders: Vec<PathBuf>,
    pub dest_base_folder: PathBuf,
    pub batch_folder_prefix: String,
    pub detection_delay_seconds: u64,
    pub cooldown_seconds: u64,
    pub idle_wait_seconds: u64,
    pub error_backoff_seconds: u64,
    pub allowed_extensions: Vec<String>,
    pub skip_hidden_files: bool,
    pub recursive_scan: bool,
    pub auto_cleanup_empty_dirs: bool,
    pub silent_mode: bool,
    pub state_file: PathBuf,
    pub stability_mode: StabilityMode,
    pub lock_probe_attempts: u32,
    pub lock_probe_backoff_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_folders: Vec::new(),
            dest_base_folder: PathBuf::new(),
            batch_folder_prefix: DEFAULT_BATCH_PREFIX.to_string(),
            detection_delay_seconds: 10,
            cooldown_seconds: 30,
            idle_wait_seconds: 5,
            error_backoff_seconds: 5,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            skip_hidden_files: true,
            recursive_scan: false,
            auto_cleanup_empty_dirs: false,
            silent_mode: true,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            stability_mode: StabilityMode::Count,
            lock_probe_attempts: 3,
            lock_probe_backoff_millis: 300,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn detection_delay(&self) -> Duration {
        Duration::from_secs(self.detection_delay_seconds)
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    #[must_use]
    pub const fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_seconds)
    }

    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }

    #[must_use]
    pub const fn lock_probe(&self) -> LockProbe {
        LockProbe {
            attempts: self.lock_probe_attempts,
            backoff: Duration::from_millis(self.lock_probe_backoff_millis),
        }
    }

    /// 正規化後的副檔名集合（小寫、含前導點）
    #[must_use]
    pub fn extension_set(&self) -> HashSet<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| ext.len() > 1)
            .collect()
    }

    /// 檢查設定是否可用，回傳所有問題而非第一個
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.extension_set().is_empty() {
            errors.push(ConfigError::NoExtensions);
        }

        if self.dest_base_folder.as_os_str().is_empty() {
            errors.push(ConfigError::MissingDestination);
        }

        let mut seen: HashSet<&Path> = HashSet::new();
        let all_paths = self
            .source_folders
            .iter()
            .chain(std::iter::once(&self.dest_base_folder))
            .filter(|p| !p.as_os_str().is_empty());
        for path in all_paths {
            if !seen.insert(path.as_path()) {
                errors.push(ConfigError::DuplicatePath(path.clone()));
            }
        }

        errors.extend(self.nested_paths());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 來源資料夾互相包含，或遞迴掃描時目的地位於來源之內，
    /// 都會讓同一個檔案被重複掃描
    fn nested_paths(&self) -> Vec<ConfigError> {
        let sources: Vec<(&PathBuf, PathBuf)> = self
            .source_folders
            .iter()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| (p, absolute_or_raw(p)))
            .collect();
        let mut errors = Vec::new();

        for (inner, inner_abs) in &sources {
            for (outer, outer_abs) in &sources {
                if inner_abs != outer_abs && inner_abs.starts_with(outer_abs) {
                    errors.push(ConfigError::NestedPath {
                        inner: (*inner).clone(),
                        outer: (*outer).clone(),
                    });
                }
            }
        }

        if self.recursive_scan && !self.dest_base_folder.as_os_str().is_empty() {
            let dest_abs = absolute_or_raw(&self.dest_base_folder);
            for (source, source_abs) in &sources {
                if dest_abs != *source_abs && dest_abs.starts_with(source_abs) {
                    errors.push(ConfigError::NestedPath {
                        inner: self.dest_base_folder.clone(),
                        outer: (*source).clone(),
                    });
                }
            }
        }

        errors
    }
}

fn absolute_or_raw(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// 將 "JPG"、".Jpg" 等寫法統一為 ".jpg"
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// 可跨執行緒共用的設定，讀取時一律複製一份快照
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
