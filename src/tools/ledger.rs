use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 狀態檔的磁碟格式
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    processed_files: Vec<String>,
    #[serde(default)]
    last_updated: Option<String>,
}

/// 已移動檔案的紀錄：Key 是原始的絕對路徑
///
/// 只要路徑在紀錄中，掃描時就不會再被視為候選檔案，
/// 直到 [`Ledger::prune`] 發現該路徑已不存在而將其移除。
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    processed_files: HashSet<String>,
}

impl Ledger {
    /// 建立空的紀錄，不讀取磁碟
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            processed_files: HashSet::new(),
        }
    }

    /// 從狀態檔載入；檔案不存在或損毀時回傳空紀錄
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut ledger = Self::new(path);
        if !ledger.path.exists() {
            warn!(
                "State file {} not found, starting with an empty ledger",
                ledger.path.display()
            );
            return ledger;
        }

        match Self::read_entries(&ledger.path) {
            Ok(entries) => {
                debug!(
                    "Loaded {} ledger entries from {}",
                    entries.len(),
                    ledger.path.display()
                );
                ledger.processed_files = entries;
            }
            Err(e) => warn!("Could not load state, starting empty: {e:#}"),
        }
        ledger
    }

    fn read_entries(path: &Path) -> Result<HashSet<String>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(HashSet::new());
        }

        let file: LedgerFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;

        Ok(file.processed_files.into_iter().collect())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.processed_files.contains(&identity(path))
    }

    /// 記錄一個已移動的檔案並立即寫回磁碟
    ///
    /// 寫入失敗時記憶體中的紀錄仍然有效，下次成功寫入會一併補上。
    pub fn record(&mut self, path: &Path) -> Result<()> {
        self.processed_files.insert(identity(path));
        self.save()
    }

    /// 移除磁碟上已不存在的路徑，回傳移除數量
    pub fn prune(&mut self) -> usize {
        let before = self.processed_files.len();
        self.processed_files.retain(|p| Path::new(p).exists());
        let removed = before - self.processed_files.len();

        if removed > 0 {
            info!("Pruned {removed} stale ledger entries");
            if let Err(e) = self.save() {
                error!("Could not save state: {e:#}");
            }
        }

        removed
    }

    /// 先寫入暫存檔再改名，避免中途當機留下半份狀態檔
    pub fn save(&self) -> Result<()> {
        let mut processed_files: Vec<String> = self.processed_files.iter().cloned().collect();
        processed_files.sort();

        let file = LedgerFile {
            processed_files,
            last_updated: Some(Local::now().to_rfc3339()),
        };
        let content = serde_json::to_string_pretty(&file).context("Failed to serialize state")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write state file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace state file {}", self.path.display()))?;

        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processed_files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed_files.is_empty()
    }
}

fn identity(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
