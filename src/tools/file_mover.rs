use crate::tools::{Candidate, Ledger};
use anyhow::{Context, Result, anyhow, bail};
use log::{debug, error};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// 實際搬移檔案的方式
pub trait Relocator: Send {
    fn relocate(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// 先嘗試 rename，跨檔案系統時改為複製後刪除
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRelocator;

impl Relocator for FsRelocator {
    fn relocate(&self, source: &Path, destination: &Path) -> Result<()> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                debug!(
                    "rename failed for {} ({rename_err}), falling back to copy",
                    source.display()
                );
                copy_and_delete(source, destination)
            }
        }
    }
}

/// 複製檔案後刪除原檔案
fn copy_and_delete(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target).with_context(|| {
        format!("Failed to copy {} -> {}", source.display(), target.display())
    })?;

    fs::remove_file(source)
        .with_context(|| format!("Failed to remove original {}", source.display()))?;

    Ok(())
}

/// 找出目的資料夾中不會覆蓋既有檔案的名稱：`name.ext`、`name_1.ext`、`name_2.ext`…
#[must_use]
pub fn unique_destination(dest_folder: &Path, file_name: &OsStr) -> PathBuf {
    let first = dest_folder.join(file_name);
    if !first.exists() {
        return first;
    }

    let original = Path::new(file_name);
    let stem = original.file_stem().unwrap_or(file_name);
    let extension = original.extension();

    let mut counter: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("_{counter}"));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = dest_folder.join(&name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// 一次搬移的統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveResult {
    pub moved: usize,
    pub attempted: usize,
    /// (原始路徑, 目的路徑)
    pub moves: Vec<(PathBuf, PathBuf)>,
    /// (原始路徑, 失敗原因)
    pub failures: Vec<(PathBuf, String)>,
}

impl MoveResult {
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.moved < self.attempted
    }
}

/// 將候選檔案搬到批次資料夾，成功後寫入紀錄
pub struct FileMover<'a> {
    ledger: &'a mut Ledger,
    relocator: &'a dyn Relocator,
}

impl<'a> FileMover<'a> {
    pub fn new(ledger: &'a mut Ledger, relocator: &'a dyn Relocator) -> Self {
        Self { ledger, relocator }
    }

    /// 搬移單一檔案並確認原檔已消失，回傳實際的目的路徑
    pub fn move_file(&mut self, source: &Path, batch_folder: &Path) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("No file name in {}", source.display()))?;
        let destination = unique_destination(batch_folder, file_name);

        self.relocator.relocate(source, &destination)?;

        if fs::symlink_metadata(source).is_ok() {
            bail!(
                "Move verification failed: {} still exists",
                source.display()
            );
        }

        // 檔案已經搬走，紀錄寫不進去只會讓之後多複製一次，不會遺失資料
        if let Err(e) = self.ledger.record(source) {
            error!("Could not save state after moving {}: {e:#}", source.display());
        }

        Ok(destination)
    }

    /// 逐一搬移，單一檔案失敗不影響其他檔案
    ///
    /// 成功與失敗都只記在回傳值中，由呼叫端決定如何回報。
    pub fn move_candidates<'c, I>(&mut self, candidates: I, batch_folder: &Path) -> MoveResult
    where
        I: IntoIterator<Item = &'c Candidate>,
    {
        let mut result = MoveResult::default();

        for candidate in candidates {
            result.attempted += 1;
            match self.move_file(&candidate.path, batch_folder) {
                Ok(destination) => {
                    result.moved += 1;
                    result.moves.push((candidate.path.clone(), destination));
                }
                Err(e) => result
                    .failures
                    .push((candidate.path.clone(), format!("{e:#}"))),
            }
        }

        result
    }
}
