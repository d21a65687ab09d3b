use crate::config::{Config, extension_of};
use crate::tools::{Ledger, LockProbe};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// 一次掃描中觀察到、符合條件的檔案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub source_folder: PathBuf,
    /// 小寫、含前導點
    pub extension: String,
    /// 掃描當下的大小，[`crate::config::StabilityMode::Identity`] 用來判斷檔案是否仍在變動
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceScan {
    pub source_folder: PathBuf,
    pub candidates: Vec<Candidate>,
}

/// 單次掃描結果：依設定順序排列的來源資料夾與其候選檔案
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    sources: Vec<SourceScan>,
}

impl ScanResult {
    #[must_use]
    pub fn total(&self) -> usize {
        self.sources.iter().map(|s| s.candidates.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    #[must_use]
    pub fn sources(&self) -> &[SourceScan] {
        &self.sources
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.sources.iter().flat_map(|s| s.candidates.iter())
    }

    /// 每個候選檔案的 (路徑, 大小)
    #[must_use]
    pub fn fingerprints(&self) -> HashSet<(&Path, u64)> {
        self.candidates().map(|c| (c.path.as_path(), c.size)).collect()
    }

    pub fn push(&mut self, scan: SourceScan) {
        self.sources.push(scan);
    }
}

/// 判斷來源資料夾中哪些檔案可以被移動
pub struct EligibilityFilter<'a> {
    config: &'a Config,
    ledger: &'a Ledger,
    extensions: HashSet<String>,
    lock_probe: LockProbe,
}

impl<'a> EligibilityFilter<'a> {
    #[must_use]
    pub fn new(config: &'a Config, ledger: &'a Ledger) -> Self {
        Self {
            config,
            ledger,
            extensions: config.extension_set(),
            lock_probe: config.lock_probe(),
        }
    }

    /// 掃描所有來源資料夾；不存在的資料夾只記錄警告並略過
    #[must_use]
    pub fn scan_all_sources(&self) -> ScanResult {
        let mut result = ScanResult::default();

        for source_folder in &self.config.source_folders {
            if !source_folder.exists() {
                warn!("Source folder not found: {}", source_folder.display());
                continue;
            }
            if !source_folder.is_dir() {
                warn!("Source folder is not a directory: {}", source_folder.display());
                continue;
            }

            result.push(SourceScan {
                source_folder: source_folder.clone(),
                candidates: self.scan_source(source_folder),
            });
        }

        result
    }

    /// 依列舉順序回傳單一資料夾中的候選檔案（不排序）
    #[must_use]
    pub fn scan_source(&self, source_folder: &Path) -> Vec<Candidate> {
        let root =
            std::path::absolute(source_folder).unwrap_or_else(|_| source_folder.to_path_buf());
        let max_depth = if self.config.recursive_scan {
            usize::MAX
        } else {
            1
        };

        let mut candidates = Vec::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false);

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if let Some(candidate) = self.evaluate(&entry, source_folder) {
                        candidates.push(candidate);
                    }
                }
                Err(e) => warn!("Skipping unreadable entry under {}: {e}", root.display()),
            }
        }

        debug!(
            "Found {} eligible files in {}",
            candidates.len(),
            source_folder.display()
        );
        candidates
    }

    fn evaluate(&self, entry: &DirEntry, source_folder: &Path) -> Option<Candidate> {
        let path = entry.path();

        let metadata = match regular_file_metadata(entry) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cannot read metadata for {}: {e}", path.display());
                return None;
            }
        };

        if self.config.skip_hidden_files && entry.file_name().to_string_lossy().starts_with('.') {
            return None;
        }

        let extension = extension_of(path)?;
        if !self.extensions.contains(&extension) {
            return None;
        }

        if self.ledger.contains(path) {
            return None;
        }

        if self.lock_probe.is_locked(path) {
            debug!("File still being written, skipping: {}", path.display());
            return None;
        }

        Some(Candidate {
            path: path.to_path_buf(),
            source_folder: source_folder.to_path_buf(),
            extension,
            size: metadata.len(),
        })
    }
}

/// 一般檔案或指向一般檔案的符號連結回傳 metadata，其餘回傳 None
fn regular_file_metadata(entry: &DirEntry) -> std::io::Result<Option<fs::Metadata>> {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return entry.metadata().map(Some).map_err(std::io::Error::from);
    }
    if file_type.is_symlink() {
        return match fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata)),
            _ => Ok(None),
        };
    }
    Ok(None)
}
